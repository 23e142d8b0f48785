//! Application root owning the shared bus, the tick scheduler and config.

use std::sync::Arc;

use crate::bus::ActionBus;
use crate::config::{Config, ConfigError};
use crate::scheduler::Scheduler;

/// Process-scoped root handed to every controller, store and registry.
///
/// Cloning is cheap and yields a handle to the same bus and scheduler.
#[derive(Clone)]
pub struct Hub {
    bus: ActionBus,
    scheduler: Scheduler,
    config: Arc<Config>,
}

impl Hub {
    /// Hub with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            bus: ActionBus::new().with_tracing(config.trace_actions),
            scheduler: Scheduler::with_max_batch(config.scheduler.max_batch),
            config: Arc::new(config),
        }
    }

    /// Hub configured from the default config file.
    pub fn from_config_file() -> Result<Self, ConfigError> {
        Ok(Self::with_config(Config::load()?))
    }

    pub fn bus(&self) -> &ActionBus {
        &self.bus
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A fresh bus with this hub's settings, sharing nothing with the
    /// global one.
    pub fn private_bus(&self) -> ActionBus {
        ActionBus::new().with_tracing(self.config.trace_actions)
    }

    /// Run one scheduler tick on the calling thread.
    pub fn tick(&self) -> usize {
        self.scheduler.run_pending()
    }

    /// Drive the scheduler on the tokio runtime until [`Hub::shutdown`].
    pub fn spawn_scheduler(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
