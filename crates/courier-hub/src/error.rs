//! Error types for the connection hub.
//!
//! A [`DeliveryFailed`] never leaves the hub. The notifier logs it, evicts
//! the handle that produced it, and carries on with the remaining handles.

use std::time::Duration;

/// A single write to a connection handle did not complete.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryFailed {
    /// The transport rejected the write (peer gone, socket reset, channel
    /// receiver dropped).
    #[error("transport error: {0}")]
    Transport(String),

    /// The write did not complete within the per-write deadline.
    #[error("write timed out after {0:?}")]
    TimedOut(Duration),

    /// The event could not be encoded as a JSON text frame.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
