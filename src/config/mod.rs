//! Configuration loading for the hub.

mod loader;
mod types;

pub use loader::{ConfigError, CONFIG_ENV_VAR};
pub use types::{Config, SchedulerConfig};
