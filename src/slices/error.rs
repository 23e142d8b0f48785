use thiserror::Error;

/// Errors raised when moving slice values in and out of the aggregate
/// snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to serialize slice '{name}': {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to deserialize slice '{name}': {source}")]
    Deserialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}
