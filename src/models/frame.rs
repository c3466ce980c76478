// Inbound telemetry frames: wire shapes and the canonical frame

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::FrameError;

/// Parameter name → reading.
pub type Metrics = BTreeMap<String, f64>;

/// One received sample set, normalized from either wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryFrame {
    /// As sent by the server, or capture time (RFC 3339, UTC, millis) when absent.
    pub timestamp: String,
    pub metrics: Metrics,
}

impl TelemetryFrame {
    pub fn new(timestamp: impl Into<String>, metrics: Metrics) -> Self {
        Self {
            timestamp: timestamp.into(),
            metrics,
        }
    }

    /// Parse a text message, stamping it with the current time if it carries none.
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        Self::parse_at(raw, Utc::now())
    }

    /// Same as [`TelemetryFrame::parse`] with an explicit capture time.
    pub fn parse_at(raw: &str, captured_at: DateTime<Utc>) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(WireFrame::classify(value)?.into_frame(captured_at))
    }

    pub fn get(&self, parameter: &str) -> Option<f64> {
        self.metrics.get(parameter).copied()
    }

    pub fn contains(&self, parameter: &str) -> bool {
        self.metrics.contains_key(parameter)
    }

    /// The timestamp as a date, if the server sent something chrono can read.
    pub fn parsed_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok()
    }
}

/// The two payload shapes the endpoint may send.
#[derive(Debug, PartialEq)]
enum WireFrame {
    /// `{ "timestamp": "...", "metrics": { ... }, ... }`
    Enveloped {
        timestamp: Option<String>,
        metrics: Map<String, Value>,
    },
    /// `{ "temperature": 21.5, ... }`, optionally with a top-level `timestamp`.
    Bare {
        timestamp: Option<String>,
        metrics: Map<String, Value>,
    },
}

impl WireFrame {
    fn classify(value: Value) -> Result<Self, FrameError> {
        let Value::Object(mut obj) = value else {
            return Err(FrameError::NotAnObject);
        };
        let timestamp = match obj.remove("timestamp") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        match obj.remove("metrics") {
            Some(Value::Object(metrics)) => Ok(WireFrame::Enveloped { timestamp, metrics }),
            // null counts as absent
            Some(Value::Null) | None => Ok(WireFrame::Bare {
                timestamp,
                metrics: obj,
            }),
            Some(_) => Err(FrameError::MetricsNotAnObject),
        }
    }

    fn into_frame(self, captured_at: DateTime<Utc>) -> TelemetryFrame {
        let (timestamp, raw) = match self {
            WireFrame::Enveloped { timestamp, metrics } => (timestamp, metrics),
            WireFrame::Bare { timestamp, metrics } => (timestamp, metrics),
        };
        let metrics = raw
            .into_iter()
            .filter_map(|(name, value)| match value.as_f64() {
                Some(v) => Some((name, v)),
                None => {
                    tracing::trace!(parameter = %name, "skipping non-numeric metric");
                    None
                }
            })
            .collect();
        TelemetryFrame {
            timestamp: timestamp
                .unwrap_or_else(|| captured_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_prefers_envelope() {
        let v = serde_json::json!({ "timestamp": "t", "metrics": { "a": 1 }, "source": "plc" });
        match WireFrame::classify(v).unwrap() {
            WireFrame::Enveloped { timestamp, metrics } => {
                assert_eq!(timestamp.as_deref(), Some("t"));
                assert_eq!(metrics.len(), 1);
            }
            other => panic!("expected envelope, got {:?}", other),
        }
    }

    #[test]
    fn classify_null_metrics_as_bare() {
        let v = serde_json::json!({ "metrics": null, "a": 2.5 });
        assert!(matches!(
            WireFrame::classify(v).unwrap(),
            WireFrame::Bare { .. }
        ));
    }

    #[test]
    fn classify_rejects_non_object() {
        assert!(matches!(
            WireFrame::classify(serde_json::json!([1, 2])),
            Err(FrameError::NotAnObject)
        ));
        assert!(matches!(
            WireFrame::classify(serde_json::json!({ "metrics": 4 })),
            Err(FrameError::MetricsNotAnObject)
        ));
    }
}
