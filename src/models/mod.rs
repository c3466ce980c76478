// Domain models: stream keys, frames, status

mod frame;
mod status;
mod stream_key;

pub use frame::{Metrics, TelemetryFrame};
pub use status::{ConnectionStatus, StreamSnapshot};
pub use stream_key::{StreamKey, stream_scheme};
