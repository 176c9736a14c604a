//! Control-plane configuration.
//!
//! Loaded from a JSON file; every field has a default so an empty object
//! (or no file at all) yields a working setup.

use macsec_hal::PollConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacsecCtlConfig {
    /// Busy-bit polls before an SA key load is reported as timed out.
    pub key_install_poll_attempts: u32,

    /// Delay between busy-bit polls, in microseconds.
    pub key_install_poll_interval_us: u64,

    /// Drop non-MACsec frames arriving on the line side once the engine is on.
    pub ingress_drop_non_macsec: bool,

    pub lmac_disable_length_validate: bool,

    pub hmac_disable_length_validate: bool,

    /// Period of the sequence-event tick, in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for MacsecCtlConfig {
    fn default() -> Self {
        Self {
            key_install_poll_attempts: 16,
            key_install_poll_interval_us: 10,
            ingress_drop_non_macsec: true,
            lmac_disable_length_validate: false,
            hmac_disable_length_validate: false,
            tick_interval_ms: 100,
        }
    }
}

impl MacsecCtlConfig {
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.key_install_poll_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "key_install_poll_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                message: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Busy-bit polling for key loads; always polls at least once.
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            attempts: self.key_install_poll_attempts.max(1),
            interval: Duration::from_micros(self.key_install_poll_interval_us),
        }
    }

    /// Event tick period, never shorter than 1ms.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}
