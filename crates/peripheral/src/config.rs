//! Service configuration.
//!
//! Configuration can come from a TOML file, environment variables, or
//! built-in defaults, in that priority order (environment wins).
//!
//! # Example picoble.toml
//!
//! ```toml
//! [framing]
//! max_send_size = 128
//!
//! [advertising]
//! recycle_interval_secs = 10
//! interval_min = 0x00A0
//! interval_max = 0x00AF
//! tune_interval = true
//!
//! [identity]
//! public_key_path = "pico_pub_key.der"
//! private_key_path = "pico_priv_key.der"
//! users_path = "users.txt"
//! ```
//!
//! # Environment variable overrides
//!
//! ```bash
//! export PICOBLE_MAX_SEND_SIZE=64
//! export PICOBLE_RECYCLE_INTERVAL_SECS=30
//! export PICOBLE_TUNE_INTERVAL=false
//! ```

use picoble_framing::{DEFAULT_MAX_SEND_SIZE, MAX_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to read configuration file
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for the peripheral service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Wire framing configuration
    pub framing: FramingConfig,
    /// Advertising configuration
    pub advertising: AdvertisingConfig,
    /// Identity file locations
    pub identity: IdentityConfig,
}

/// Wire framing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Largest outbound chunk per characteristic update (1..=207)
    pub max_send_size: usize,
}

/// Advertising configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvertisingConfig {
    /// Seconds between advertisement recycles
    pub recycle_interval_secs: u64,
    /// Minimum advertising interval in 0.625 ms units
    pub interval_min: u16,
    /// Maximum advertising interval in 0.625 ms units
    pub interval_max: u16,
    /// Whether to tune the interval over raw HCI after registration
    pub tune_interval: bool,
}

/// Identity file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// DER public key path
    pub public_key_path: PathBuf,
    /// DER private key path
    pub private_key_path: PathBuf,
    /// Authorized user list path
    pub users_path: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            framing: FramingConfig::default(),
            advertising: AdvertisingConfig::default(),
            identity: IdentityConfig::default(),
        }
    }
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            max_send_size: DEFAULT_MAX_SEND_SIZE,
        }
    }
}

impl Default for AdvertisingConfig {
    fn default() -> Self {
        Self {
            recycle_interval_secs: 10,
            interval_min: 0x00A0,
            interval_max: 0x00AF,
            tune_interval: true,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            public_key_path: PathBuf::from("pico_pub_key.der"),
            private_key_path: PathBuf::from("pico_priv_key.der"),
            users_path: PathBuf::from("users.txt"),
        }
    }
}

impl ServiceConfig {
    /// Load configuration with the following priority:
    /// 1. Environment variables (PICOBLE_*)
    /// 2. Config file (if one exists)
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        config = Self::apply_env_overrides(config);
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let config: ServiceConfig =
            toml::from_str(&content).map_err(|source| ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(config)
    }

    /// Find a config file in standard locations
    /// 1. ./picoble.toml (current directory)
    /// 2. ~/.config/picoble/picoble.toml
    fn find_config_file() -> Option<PathBuf> {
        let local_config = PathBuf::from("picoble.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        if let Some(home_dir) = std::env::var_os("HOME") {
            let user_config = PathBuf::from(home_dir)
                .join(".config")
                .join("picoble")
                .join("picoble.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: ServiceConfig) -> Self {
        if let Ok(size) = std::env::var("PICOBLE_MAX_SEND_SIZE") {
            if let Ok(size) = size.parse() {
                config.framing.max_send_size = size;
            }
        }

        if let Ok(secs) = std::env::var("PICOBLE_RECYCLE_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                config.advertising.recycle_interval_secs = secs;
            }
        }

        if let Ok(tune) = std::env::var("PICOBLE_TUNE_INTERVAL") {
            config.advertising.tune_interval = tune.parse().unwrap_or(true);
        }

        config
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.framing.max_send_size == 0 || self.framing.max_send_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "framing.max_send_size must be between 1 and {}",
                MAX_CHUNK_SIZE
            )));
        }

        if self.advertising.recycle_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "advertising.recycle_interval_secs must be at least 1".to_string(),
            ));
        }

        // Interval bounds from the Bluetooth core specification.
        let (min, max) = (self.advertising.interval_min, self.advertising.interval_max);
        if min < 0x0020 || max > 0x4000 || min > max {
            return Err(ConfigError::ValidationError(format!(
                "advertising interval range {:#06X}..{:#06X} is invalid",
                min, max
            )));
        }

        Ok(())
    }

    /// Recycle period as a duration.
    pub fn recycle_interval(&self) -> Duration {
        Duration::from_secs(self.advertising.recycle_interval_secs)
    }
}
