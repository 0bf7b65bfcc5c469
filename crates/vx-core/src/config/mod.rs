//! Configuration management for vpnexiter

mod app;
mod provider;
pub mod serde_utils;

pub use app::{AppConfig, CheckConfig, ListenConfig, RouterConfig, RouterMode};
pub use provider::{ConfigSource, TomlConfig, ValueKind};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Maximum number of hierarchy levels a vendor may declare
pub const MAX_LEVELS: usize = 5;

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vpnexiter")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Config files searched when no explicit path is given, in priority order
pub fn config_search_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("./config.toml"), default_config_path()]
}

/// Load configuration from a file, layered over the built-in defaults
pub fn load_config(path: &Path) -> Result<TomlConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    TomlConfig::from_str_with_defaults(&content)
}

/// Load the first config file found on the search path, or the defaults
pub fn discover_config() -> Result<TomlConfig, ConfigError> {
    for candidate in config_search_paths() {
        if candidate.is_file() {
            tracing::info!("Loading config file: {}", candidate.display());
            return load_config(&candidate);
        }
    }
    tracing::info!("Using default configuration");
    Ok(TomlConfig::defaults())
}
