// Connection status and the read-only snapshot handed to consumers

use serde::Serialize;
use std::fmt;

use super::{Metrics, TelemetryFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Open,
    Closed,
    Error,
}

impl ConnectionStatus {
    /// Text for the stream indicator widget.
    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Open => "Connected",
            ConnectionStatus::Closed => "Disconnected",
            ConnectionStatus::Error => "Error",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Closed => "closed",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of a stream client's state. Consumers never see the live buffer.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSnapshot {
    pub status: ConnectionStatus,
    pub latest: Metrics,
    pub history: Vec<TelemetryFrame>,
    pub frames_applied: u64,
    pub frames_dropped: u64,
}
