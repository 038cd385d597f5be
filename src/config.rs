//! Application settings stored as JSON
//!
//! ```json
//! {
//!   "PlcIpAddress": "192.168.0.10",
//!   "ApiBaseUrl": "http://localhost:5000/"
//! }
//! ```
//!
//! A missing file is created with the defaults above. A file that exists but
//! does not parse is an error; callers treat it as fatal.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::transport::Endpoint;

/// Settings file location relative to the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "config/config.json";

pub const DEFAULT_PLC_IP: &str = "192.168.0.10";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/";

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persisted application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "PlcIpAddress")]
    pub plc_ip_address: String,
    #[serde(rename = "ApiBaseUrl")]
    pub api_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            plc_ip_address: DEFAULT_PLC_IP.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl Settings {
    /// S7-1200, rack 0, slot 1 at the configured address.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.plc_ip_address.clone())
    }
}

/// Reads and writes a [`Settings`] file.
pub struct SettingsLoader {
    path: PathBuf,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new(DEFAULT_SETTINGS_PATH)
    }
}

impl SettingsLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings, creating the file with defaults if it is missing.
    pub fn load_or_create(&self) -> Result<Settings, ConfigError> {
        if !self.path.exists() {
            let settings = Settings::default();
            self.save(&settings)?;
            warn!(
                "Settings file {} not found, created with defaults",
                self.path.display()
            );
            return Ok(settings);
        }
        self.load()
    }

    /// Load the settings from an existing file.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        let settings: Settings =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: self.path.display().to_string(),
                source,
            })?;
        info!("Loaded settings from {}", self.path.display());
        Ok(settings)
    }

    /// Write `settings` as pretty-printed JSON, creating parent directories.
    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
            }
        }
        let contents = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, contents).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}
