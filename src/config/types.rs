use serde::{Deserialize, Serialize};

use crate::scheduler::DEFAULT_MAX_BATCH;

/// Root configuration container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default `tracing` filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Log every dispatched action at trace level.
    #[serde(default)]
    pub trace_actions: bool,
    /// Upper bound for remote queries in milliseconds.
    ///
    /// Unset means a query for a type with no live controller stays
    /// pending until its envelope is dropped.
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Deferred task queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum jobs run by one tick (default: 1024).
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_max_batch() -> usize {
    DEFAULT_MAX_BATCH
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_batch: default_max_batch(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            trace_actions: false,
            query_timeout_ms: None,
            scheduler: SchedulerConfig::default(),
        }
    }
}
