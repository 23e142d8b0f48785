use std::fs;

use statebus::config::CONFIG_ENV_VAR;
use statebus::{Config, ConfigError, Hub};
use tempfile::TempDir;

/// The config file named by `STATEBUS_CONFIG` drives `Config::load` and
/// `Hub::from_config_file`.
///
/// Kept as a single test: the override is process-wide.
#[test]
fn test_env_override_selects_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("statebus.toml");
    fs::write(
        &path,
        r#"
trace_actions = true
query_timeout_ms = 75

[scheduler]
max_batch = 4
"#,
    )
    .unwrap();

    std::env::set_var(CONFIG_ENV_VAR, &path);
    assert_eq!(Config::config_path(), path);

    let hub = Hub::from_config_file().unwrap();
    assert!(hub.config().trace_actions);
    assert_eq!(hub.config().query_timeout_ms, Some(75));
    assert_eq!(hub.config().scheduler.max_batch, 4);

    // A missing file falls back to defaults.
    let missing = temp_dir.path().join("missing.toml");
    std::env::set_var(CONFIG_ENV_VAR, &missing);
    assert_eq!(Config::load().unwrap(), Config::default());

    // An invalid file is reported, not defaulted.
    fs::write(&path, "[scheduler]\nmax_batch = 0\n").unwrap();
    std::env::set_var(CONFIG_ENV_VAR, &path);
    assert!(matches!(
        Hub::from_config_file(),
        Err(ConfigError::ValidationError { .. })
    ));

    fs::write(&path, "invalid { toml }").unwrap();
    assert!(matches!(
        Hub::from_config_file(),
        Err(ConfigError::ParseError { .. })
    ));

    std::env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_config_default_values() {
    let config = Config::default();
    assert!(!config.trace_actions);
    assert_eq!(config.query_timeout_ms, None);
    assert!(config.scheduler.max_batch > 0);
    assert!(config.validate().is_ok());
}
