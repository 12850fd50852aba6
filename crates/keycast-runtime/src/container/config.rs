//! # Runtime Configuration
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `KEYCAST_CHANNEL_CAPACITY` | `1000` | Capacity of every channel |
//! | `KEYCAST_BATCH_SIZE` | `10` | Events drained per worker iteration |
//! | `KEYCAST_POLL_INTERVAL_MS` | `100` | Idle wait before a worker re-checks for exit |
//! | `KEYCAST_SETTINGS` | `config/settings.json` | Settings file (first CLI argument wins) |

use crate::registry::RegistryConfig;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default settings file, relative to the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.json";

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("batch size {batch_size} exceeds channel capacity {capacity}")]
    BatchExceedsCapacity { batch_size: usize, capacity: usize },
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub settings_path: PathBuf,
    pub registry: RegistryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            registry: RegistryConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load from environment variables, with `cli_path` overriding
    /// `KEYCAST_SETTINGS`.
    pub fn from_env(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), cli_path)
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F, cli_path: Option<PathBuf>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(capacity) = positive(&lookup, "KEYCAST_CHANNEL_CAPACITY")? {
            config.registry.channel_capacity = capacity as usize;
        }
        if let Some(batch_size) = positive(&lookup, "KEYCAST_BATCH_SIZE")? {
            config.registry.batch_size = batch_size as usize;
        }
        if let Some(ms) = positive(&lookup, "KEYCAST_POLL_INTERVAL_MS")? {
            config.registry.poll_interval = Duration::from_millis(ms);
        }

        config.settings_path = cli_path
            .or_else(|| lookup("KEYCAST_SETTINGS").map(PathBuf::from))
            .unwrap_or(config.settings_path);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let RegistryConfig {
            channel_capacity,
            batch_size,
            ..
        } = self.registry;
        if batch_size > channel_capacity {
            return Err(ConfigError::BatchExceedsCapacity {
                batch_size,
                capacity: channel_capacity,
            });
        }
        Ok(())
    }
}

fn positive<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::InvalidNumber { name, value }),
    }
}
