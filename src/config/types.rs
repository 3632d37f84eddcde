//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::repository::RepositoryConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Sync core configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Client behaviour.
    #[serde(default)]
    pub client: ClientConfig,
    /// Cache capacities and flush timing.
    #[serde(default)]
    pub repository: RepositoryConfig,
    /// Optional SQLite persistence. In-memory stores are used when absent.
    pub database: Option<DatabaseConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Client behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Reload every watched channel when the socket comes back after a drop (default: true).
    #[serde(default = "default_true")]
    pub reconcile_on_reconnect: bool,
    /// Wipe repositories on logout (default: true).
    #[serde(default = "default_true")]
    pub clear_on_logout: bool,
    /// Number of resident messages a channel coordinator loads on watch (default: 30).
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconcile_on_reconnect: true,
            clear_on_logout: true,
            message_limit: default_message_limit(),
        }
    }
}

pub(super) fn default_true() -> bool {
    true
}

fn default_message_limit() -> usize {
    30
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`.
    pub path: String,
}
