use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use common::crypto::DerivationParams;

use crate::controller::SyncConfig;

pub const APP_NAME: &str = "latch";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_REMOTE: &str = "http://localhost:8080";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Gateway that receives signed requests
    #[serde(default = "default_remote")]
    pub remote: Url,
    /// Quiet period after a path or password change before reading
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Give up on a request after this many seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_remote() -> Url {
    Url::parse(DEFAULT_REMOTE).expect("hardcoded URL must parse")
}

fn default_debounce_ms() -> u64 {
    400
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            debounce_ms: default_debounce_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Get the latch directory path (custom or default ~/.latch)
    pub fn latch_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Load the config from the latch directory. A missing file gives the
    /// defaults.
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = Self::latch_dir(custom_path)?.join(CONFIG_FILE_NAME);
        Self::load_file(&config_path)
    }

    pub fn load_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let config_toml = fs::read_to_string(config_path)?;
        Ok(toml::from_str(&config_toml)?)
    }

    /// Write the config into the latch directory, creating it if needed.
    pub fn save(&self, custom_path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        let latch_dir = Self::latch_dir(custom_path)?;
        fs::create_dir_all(&latch_dir)?;
        let config_path = latch_dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, toml::to_string_pretty(self)?)?;
        Ok(config_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            derivation: DerivationParams::PROTOCOL,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
