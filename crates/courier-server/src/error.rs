//! Error types for the gateway binary.

/// Errors that can occur while starting the gateway.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The ephemeral state store could not be reached.
    #[error("state store error: {0}")]
    Store(#[from] courier_store::StoreError),

    /// The HTTP server failed to bind or serve.
    #[error("gateway error: {0}")]
    Gateway(#[from] courier_gateway::ServerError),
}
