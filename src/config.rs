use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::scorer::ScoringWeights;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the aggregator API, e.g. `http://localhost:8000`
    pub api_base: String,
    /// Debounce delay in milliseconds applied to feed queries
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Notification polling interval in seconds
    #[serde(default = "default_notification_interval_secs")]
    pub notification_interval_secs: u64,
    #[serde(default = "default_storage_url")]
    pub storage_url: String,
    #[serde(default)]
    pub scoring: ScoringWeights,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_notification_interval_secs() -> u64 {
    60
}

fn default_storage_url() -> String {
    "sqlite:newsstand.db?mode=rwc".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Config pointing at `api_base` with every other field at its default
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            debounce_ms: default_debounce_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            notification_interval_secs: default_notification_interval_secs(),
            storage_url: default_storage_url(),
            scoring: ScoringWeights::default(),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(self.notification_interval_secs)
    }
}
