use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Config;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "STATEBUS_CONFIG";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `$STATEBUS_CONFIG` when set, otherwise
    /// `~/.config/statebus/config.toml` (or the platform equivalent via
    /// `dirs::config_dir()`), falling back to the current directory.
    pub fn config_path() -> PathBuf {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV_VAR) {
            return PathBuf::from(explicit);
        }
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("statebus").join("config.toml")
    }

    /// Loads configuration from the default config file.
    ///
    /// A missing file yields `Config::default()`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Config::default());
        }
        Self::load_from(&path)
    }

    /// Loads, parses and validates the file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - `query_timeout_ms`, when set, is non-zero
    /// - `scheduler.max_batch` is non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError {
                message: "query_timeout_ms must be greater than zero (omit it to disable)"
                    .to_string(),
            });
        }

        if self.scheduler.max_batch == 0 {
            return Err(ConfigError::ValidationError {
                message: "scheduler.max_batch must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_full_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
log_filter = "statebus=debug"
trace_actions = true
query_timeout_ms = 250

[scheduler]
max_batch = 16
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.log_filter, "statebus=debug");
        assert!(config.trace_actions);
        assert_eq!(config.query_timeout_ms, Some(250));
        assert_eq!(config.scheduler.max_batch, 16);
    }

    #[test]
    fn test_load_from_empty_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "invalid { toml }").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_load_from_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.toml");
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ReadError { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config {
            query_timeout_ms: Some(0),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = Config::default();
        config.scheduler.max_batch = 0;
        assert!(config.validate().is_err());
    }
}
