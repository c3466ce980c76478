// Stream identity: which equipment, which parameters, at what rate

use serde::Serialize;

use crate::error::StreamError;

/// Path template under the API base; `{id}` is the equipment id.
const STREAM_PATH_PREFIX: &str = "/hardware/ws/equipment";

/// (equipment, ordered parameter set, sample rate). Any change means a new connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamKey {
    equipment_id: u64,
    parameter_keys: Vec<String>,
    sample_rate_hz: f64,
}

impl StreamKey {
    /// Validates the tuple. Duplicate parameter names are collapsed, first occurrence wins.
    /// An empty parameter list is allowed and lets the server pick its default set.
    pub fn new<I, S>(
        equipment_id: u64,
        parameter_keys: I,
        sample_rate_hz: f64,
    ) -> Result<Self, StreamError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if equipment_id == 0 {
            return Err(StreamError::InvalidKey(
                "equipment id must be a positive integer".into(),
            ));
        }
        if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
            return Err(StreamError::InvalidKey(format!(
                "sample rate must be a positive number, got {}",
                sample_rate_hz
            )));
        }
        let mut keys: Vec<String> = Vec::new();
        for key in parameter_keys {
            let key = key.into();
            if key.trim().is_empty() {
                return Err(StreamError::InvalidKey(
                    "parameter names must be non-empty".into(),
                ));
            }
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(Self {
            equipment_id,
            parameter_keys: keys,
            sample_rate_hz,
        })
    }

    pub fn equipment_id(&self) -> u64 {
        self.equipment_id
    }

    pub fn parameter_keys(&self) -> &[String] {
        &self.parameter_keys
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Single-parameter charts keep a short history, dashboards a long one.
    pub fn is_multi_parameter(&self) -> bool {
        self.parameter_keys.len() > 1
    }

    /// WebSocket URL for this key under `api_base` (e.g. `http://host:8000/api/v1`).
    ///
    /// Pure function of the inputs: identical keys always yield byte-identical URLs.
    pub fn stream_url(&self, api_base: &str) -> String {
        let base = stream_scheme(api_base.trim_end_matches('/'));
        let mut query = Vec::with_capacity(2);
        if !self.parameter_keys.is_empty() {
            query.push(format!(
                "keys={}",
                urlencoding::encode(&self.parameter_keys.join(","))
            ));
        }
        query.push(format!("hz={}", self.sample_rate_hz));
        format!(
            "{}{}/{}/stream?{}",
            base,
            STREAM_PATH_PREFIX,
            self.equipment_id,
            query.join("&")
        )
    }
}

/// Upgrade `http://` → `ws://` and `https://` → `wss://`; anything else is returned as is.
pub fn stream_scheme(base: &str) -> String {
    match base.strip_prefix("http") {
        Some(rest) => format!("ws{}", rest),
        None => base.to_string(),
    }
}
