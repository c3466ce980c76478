use serde::Deserialize;
use std::time::Duration;

use crate::history::{CHART_HISTORY_CAPACITY, DASHBOARD_HISTORY_CAPACITY};
use crate::models::StreamKey;

const DEFAULT_CONFIG_FILE: &str = "config.toml";
/// Overrides `api.base_url` when set.
pub const API_BASE_URL_ENV: &str = "EDGE_READER_API_BASE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// REST base; the stream URL swaps its `http` scheme for `ws`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api/v1".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_hz")]
    pub default_hz: f64,
    /// Frames kept for a single-parameter chart.
    #[serde(default = "default_chart_history")]
    pub chart_history: usize,
    /// Frames kept for a multi-parameter dashboard.
    #[serde(default = "default_dashboard_history")]
    pub dashboard_history: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            default_hz: default_hz(),
            chart_history: default_chart_history(),
            dashboard_history: default_dashboard_history(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_hz() -> f64 {
    2.0
}

fn default_chart_history() -> usize {
    CHART_HISTORY_CAPACITY
}

fn default_dashboard_history() -> usize {
    DASHBOARD_HISTORY_CAPACITY
}

fn default_connect_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often `watch` logs stream stats at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_log_interval_secs: default_stats_log_interval_secs(),
        }
    }
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

/// What a session needs to open one stream.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub api_base: String,
    pub history_capacity: usize,
    pub connect_timeout: Duration,
}

impl AppConfig {
    /// Reads `CONFIG_FILE` (default `config.toml`). A missing default file means built-in
    /// defaults; a missing explicit file is an error.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("CONFIG_FILE") {
            Ok(path) => {
                let s = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("reading {}: {}", path, e))?;
                toml::from_str(&s)?
            }
            Err(_) => match std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
                Ok(s) => toml::from_str(&s)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
                Err(e) => return Err(e.into()),
            },
        };
        if let Ok(base) = std::env::var(API_BASE_URL_ENV) {
            config.api.base_url = base;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn stream_settings(&self, dashboard: bool) -> StreamSettings {
        StreamSettings {
            api_base: self.api.base_url.clone(),
            history_capacity: if dashboard {
                self.stream.dashboard_history
            } else {
                self.stream.chart_history
            },
            connect_timeout: Duration::from_secs(self.stream.connect_timeout_secs),
        }
    }

    /// Multi-parameter keys get the dashboard history; `dashboard` forces it for any key.
    pub fn settings_for(&self, key: &StreamKey, dashboard: bool) -> StreamSettings {
        self.stream_settings(dashboard || key.is_multi_parameter())
    }

    fn validate(&self) -> anyhow::Result<()> {
        let base = self.api.base_url.as_str();
        anyhow::ensure!(!base.is_empty(), "api.base_url must be non-empty");
        anyhow::ensure!(
            ["http://", "https://", "ws://", "wss://"]
                .iter()
                .any(|scheme| base.starts_with(scheme)),
            "api.base_url must start with http://, https://, ws:// or wss://, got {}",
            base
        );
        anyhow::ensure!(
            self.stream.default_hz.is_finite() && self.stream.default_hz > 0.0,
            "stream.default_hz must be > 0, got {}",
            self.stream.default_hz
        );
        anyhow::ensure!(
            self.stream.chart_history > 0,
            "stream.chart_history must be > 0, got {}",
            self.stream.chart_history
        );
        anyhow::ensure!(
            self.stream.dashboard_history > 0,
            "stream.dashboard_history must be > 0, got {}",
            self.stream.dashboard_history
        );
        anyhow::ensure!(
            self.stream.connect_timeout_secs > 0,
            "stream.connect_timeout_secs must be > 0, got {}",
            self.stream.connect_timeout_secs
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }
}
