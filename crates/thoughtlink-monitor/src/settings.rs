//! Agent settings
//!
//! Process-level tunables in one place. Loaded from TOML at startup, falls
//! back to defaults if no file exists. Sharing preferences (`ShareConfig`) are
//! not here: they live in the state store.

use crate::monitor::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thoughtlink_core::DEFAULT_SERVICE_ADDR;
use thoughtlink_sync::{BackoffConfig, SyncConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub service: ServiceSettings,
    pub monitor: MonitorSettings,
    pub backoff: BackoffConfig,
    pub paths: PathSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// `host:port` or base URL of the collective service.
    pub address: String,
    /// Records per delivery request.
    pub batch_size: usize,
    pub handshake_timeout_ms: u64,
    /// Retry interval for unacknowledged records while connected.
    pub flush_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Quiet period after the last page mutation before extracting.
    pub quiescence_ms: u64,
    /// Force an extraction after a burst this long. 0 disables it; enable
    /// only where the platform's streaming marker is reliable.
    pub max_wait_ms: u64,
    /// Snapshot file poll interval.
    pub poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub state_dir: PathBuf,
    pub injection_dir: PathBuf,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_SERVICE_ADDR.to_string(),
            batch_size: 32,
            handshake_timeout_ms: 10_000,
            flush_interval_ms: 5_000,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            quiescence_ms: 1_500,
            max_wait_ms: 0,
            poll_ms: 250,
        }
    }
}

fn data_home() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("thoughtlink")
}

impl Default for PathSettings {
    fn default() -> Self {
        let home = data_home();
        Self {
            state_dir: home.join("state"),
            injection_dir: home.join("injections"),
        }
    }
}

impl AgentSettings {
    /// `~/.config/thoughtlink/agent.toml` or the platform equivalent.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("thoughtlink")
            .join("agent.toml")
    }

    /// Load settings from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    tracing::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::debug!("No settings at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            batch_size: self.service.batch_size.max(1),
            handshake_timeout: Duration::from_millis(self.service.handshake_timeout_ms),
            flush_interval: Duration::from_millis(self.service.flush_interval_ms.max(10)),
            ..SyncConfig::default()
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            quiescence: Duration::from_millis(self.monitor.quiescence_ms),
            max_wait: (self.monitor.max_wait_ms > 0).then(|| Duration::from_millis(self.monitor.max_wait_ms)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.poll_ms.max(10))
    }
}
