use std::fs;

use statebus::logging::{init_tracing, LOG_FILE_ENV_VAR};
use statebus::{Config, Hub, SliceDef, SliceStore};
use tempfile::TempDir;

/// With `STATEBUS_LOG` set, library events land in that file under the
/// configured filter.
#[test]
fn test_init_tracing_writes_to_log_file() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("statebus.log");
    std::env::set_var(LOG_FILE_ENV_VAR, &log_path);
    std::env::remove_var("RUST_LOG");

    let config = Config {
        log_filter: "statebus=debug".to_string(),
        ..Config::default()
    };
    init_tracing(&config);

    let store = SliceStore::new(&Hub::with_config(config));
    store
        .register_state(SliceDef::reducer("logged", 0i64, |_: &i64, _, _, _| {}))
        .unwrap();
    tracing::trace!(target: "statebus", "filtered out");

    let contents = fs::read_to_string(&log_path).unwrap();
    assert!(contents.contains("Slice registered"));
    assert!(contents.contains("DEBUG"));
    assert!(!contents.contains("filtered out"));

    std::env::remove_var(LOG_FILE_ENV_VAR);
}
