//! Error types for the ephemeral state store.
//!
//! Store failures are always surfaced to the caller. Nothing in the
//! connection hub depends on the store, so an unavailable store never
//! affects push delivery.

/// Errors that can occur talking to the ephemeral state store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
