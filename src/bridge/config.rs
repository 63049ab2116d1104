//! Bridge configuration
//!
//! Serde-backed configuration with per-field defaults and a TOML loader.
//!
//! # Usage
//!
//! ```rust
//! use cadbridge::bridge::config::BridgeConfig;
//!
//! let config = BridgeConfig::default();
//! assert_eq!(config.max_queue_depth, 64);
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Recognized bridge options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Caller wait bound when the dispatcher does not choose one, in ms.
    #[serde(default = "default_task_timeout_ms")]
    pub default_task_timeout_ms: u64,
    /// Backpressure threshold: pending tasks beyond this are rejected.
    #[serde(default = "default_queue_depth")]
    pub max_queue_depth: usize,
    /// Poller period for requesting host ticks, in ms.
    #[serde(default = "default_tick_interval_ms")]
    pub scheduler_tick_interval_ms: u64,
    /// Tasks drained per tick. 0 drains everything currently pending.
    #[serde(default)]
    pub max_tasks_per_tick: usize,
}

fn default_task_timeout_ms() -> u64 {
    30_000
}

fn default_queue_depth() -> usize {
    64
}

fn default_tick_interval_ms() -> u64 {
    100
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_task_timeout_ms: default_task_timeout_ms(),
            max_queue_depth: default_queue_depth(),
            scheduler_tick_interval_ms: default_tick_interval_ms(),
            max_tasks_per_tick: 0,
        }
    }
}

impl BridgeConfig {
    /// Default caller wait bound as a [`Duration`].
    #[inline]
    pub fn default_task_timeout(&self) -> Duration {
        Duration::from_millis(self.default_task_timeout_ms)
    }

    /// Poller period as a [`Duration`].
    #[inline]
    pub fn scheduler_tick_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler_tick_interval_ms)
    }
}

/// Load configuration from a TOML file.
/// Returns the default config if the file does not exist.
pub fn load_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    if !path.exists() {
        return Ok(BridgeConfig::default());
    }

    let content = fs::read_to_string(path).map_err(ConfigError::IoError)?;
    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Save configuration to a TOML file.
pub fn save_config(
    config: &BridgeConfig,
    path: &Path,
) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(ConfigError::IoError)?;
        }
    }

    let content = toml::to_string_pretty(config).map_err(ConfigError::SerializeError)?;
    fs::write(path, content).map_err(ConfigError::IoError)?;

    Ok(())
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    ParseError(toml::de::Error),
    SerializeError(toml::ser::Error),
}
