use tracing_subscriber::EnvFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Environment variable naming a log file.
pub const LOG_FILE_ENV_VAR: &str = "STATEBUS_LOG";

/// Initialize tracing for an application embedding the hub.
///
/// The filter comes from `RUST_LOG` when set, else `config.log_filter`.
/// Output goes to stderr, or to the file named by `STATEBUS_LOG`. The
/// library never calls this on its own; a global subscriber already being
/// installed is ignored.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let Some(log_path) = std::env::var(LOG_FILE_ENV_VAR).ok() else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .with_target(true),
            )
            .try_init();
        return;
    };

    let Ok(file) = std::fs::File::create(&log_path) else {
        eprintln!("Warning: Failed to create log file: {}", log_path);
        return;
    };

    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_level(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init();
}
