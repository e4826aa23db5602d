//! Configuration for the joymap client
//!
//! Stored as TOML; every field has a default so partial files are fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use joymap_monitor::reconnect::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use joymap_monitor::{
    StreamSettings, AXIS_DEADZONE, DEFAULT_HISTORY_CAPACITY, DEFAULT_TICK, RECENT_EVENT_ROWS,
};

use crate::api::DEFAULT_SERVER_URL;

/// Backend event stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// First reconnect delay; doubles on every consecutive failure
    pub base_delay_ms: u64,
    /// Consecutive failures tolerated before giving up
    pub max_attempts: u32,
    pub history_capacity: usize,
    /// Rows shown in the recent-event panel
    pub recent_rows: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            recent_rows: RECENT_EVENT_ROWS,
        }
    }
}

/// Local controller poller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub tick_ms: u64,
    /// Axis magnitude below which a stick counts as centred
    pub deadzone: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK.as_millis() as u64,
            deadzone: AXIS_DEADZONE,
        }
    }
}

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Base URL of the mapping service
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub stream: StreamConfig,
    pub poller: PollerConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_secs: 10,
            stream: StreamConfig::default(),
            poller: PollerConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("joymap")
            .join("monitor.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: MonitorConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.poller.tick_ms.max(1))
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            base_delay: Duration::from_millis(self.stream.base_delay_ms),
            max_attempts: self.stream.max_attempts,
            history_capacity: self.stream.history_capacity,
        }
    }
}
