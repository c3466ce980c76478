// Error taxonomy for frame parsing and stream transport

use thiserror::Error;

/// Why an inbound message was dropped instead of applied.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("`metrics` field is not an object")]
    MetricsNotAnObject,
    #[error("binary message ({0} bytes), expected UTF-8 text")]
    Binary(usize),
}

#[derive(Debug, Error)]
pub enum StreamError {
    /// Rejected before any connection is attempted; callers validate keys up front.
    #[error("invalid stream key: {0}")]
    InvalidKey(String),
    /// Non-fatal: the frame is logged and dropped.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),
    /// Non-fatal: status moves to `error`, the socket is left for the peer to close.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connect timed out after {0}s")]
    ConnectTimeout(u64),
}
