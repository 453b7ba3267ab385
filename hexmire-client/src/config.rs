//! Configuration loading for the Hexmire client.
//!
//! All fields are required unless explicitly marked optional. No defaults.
//! The config is constructed once at startup and passed by reference to
//! whatever needs it; there are no module-global managers.

use hexmire_core::Language;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the content server, e.g. `http://localhost:3000`.
    pub api_base_url: String,
    /// Active content language partition.
    pub language: Language,
    pub request_timeout_ms: u64,
    /// Directory for the LMDB cache environment.
    pub cache_dir: PathBuf,
    pub cache_max_size_mb: usize,
    /// Emit a prefetch progress report every N processed entries.
    pub progress_interval: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or HEXMIRE_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cache_dir",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cache_max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache_max_size_mb",
                reason: "must be > 0".to_string(),
            });
        }
        if self.progress_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "progress_interval",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("HEXMIRE_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
