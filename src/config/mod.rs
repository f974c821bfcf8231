//! Configuration module for Exp Uploadr
//!
//! Handles loading and parsing of the YAML credentials/config file
//! (`notion_key.yaml` by convention) with environment variable expansion and
//! validation. Configuration is loaded exactly once at startup and passed into
//! the orchestrator as an immutable value; nothing reads it at import time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Notion integration token (bearer credential)
    pub notion_token: String,

    /// Target database for experiment pages
    pub database_id: String,

    /// Name of the machine the experiment ran on, used as a page tag
    #[serde(default)]
    pub platform_name: String,

    /// Base URL of the Notion API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Size of each upload part in bytes
    #[serde(default = "default_part_size")]
    pub part_size: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Scratch directory for the archive and part files
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    ///
    /// Fails fast before any network call is attempted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notion_token.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "No Notion token found, set notion_token in the config file".into(),
            ));
        }

        if self.database_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "No database ID found, set database_id in the config file".into(),
            ));
        }

        // An unexpanded ${VAR} means the environment variable was never set;
        // reject it here instead of sending the placeholder as a credential
        for (field, value) in [
            ("notion_token", &self.notion_token),
            ("database_id", &self.database_id),
            ("api_base_url", &self.api_base_url),
        ] {
            if value.contains("${") {
                return Err(ConfigError::ValidationError(format!(
                    "{field} contains an unresolved environment variable placeholder"
                )));
            }
        }

        if !self.notion_token.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ConfigError::ValidationError(
                "notion_token contains characters that cannot be sent in an Authorization header"
                    .into(),
            ));
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(format!(
                "Invalid api_base_url '{}': must start with http:// or https://",
                self.api_base_url
            )));
        }

        if self.part_size == 0 {
            return Err(ConfigError::ValidationError(
                "part_size must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_api_base_url() -> String {
    "https://api.notion.com".to_string()
}

fn default_part_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(".tmp")
}
