//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk and parsing
//! it into validated, type-safe structures.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path specified via `--config` CLI flag (must exist)
//! 2. Default location, used only if present:
//!    - **Linux/macOS:** `~/.duorpc/config.json`
//!    - **Windows:** `%USERPROFILE%\.duorpc\config.json`
//!
//! Without a file every setting takes its default.
//!
//! # Example Configuration
//!
//! ```json
//! {
//!     "server": { "bind_address": "127.0.0.1:8080", "endpoint": "/rpc" },
//!     "protocols": { "json_rpc": true, "xml_rpc": true },
//!     "logging": { "level": "info" }
//! }
//! ```

mod settings;

pub use settings::{
    Config, IntrospectionConfig, LoggingConfig, ProtocolsConfig, ServerConfig, LOG_LEVELS,
};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.duorpc/`
/// - **Windows:** `%USERPROFILE%\.duorpc\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".duorpc"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads and parses the configuration file.
///
/// If `path` is `None`, uses the platform-specific default location and
/// falls back to [`Config::default`] when no file exists there.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - A setting is invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound {
                    path: p.to_path_buf(),
                });
            }
            p.to_path_buf()
        }
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => {
                tracing::debug!("No configuration file found, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.clone(),
        source: e,
    })?;

    // Validate the configuration
    config.validate()?;

    tracing::debug!(path = %config_path.display(), "Loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_dir_exists() {
        assert!(default_config_dir().is_some());
    }

    #[test]
    fn default_config_path_exists() {
        let path = default_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("config.json"));
    }

    #[test]
    fn load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"endpoint": "/api"}}}}"#).unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.server.endpoint, "/api");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn invalid_file_is_validation_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"logging": {{"level": "loud"}}}}"#).unwrap();
        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}
