//! Connection hub for the Courier real-time gateway.
//!
//! Tracks which drivers, restaurant dashboards, and order watchers have a
//! live duplex connection, and pushes events to them.
//!
//! # Architecture
//!
//! ```text
//! order service ──> Notifier ──snapshot──> Registry (one lock per audience)
//!                      │
//!                      ├── write (bounded) ──> ConnectionHandle ──> peer
//!                      │
//!                      └── evict failed ─────> Registry
//! ```
//!
//! # Modules
//!
//! - [`handle`] -- [`ConnectionHandle`], the writable side of a connection
//! - [`registry`] -- [`Registry`] of handles per audience
//! - [`notifier`] -- [`Notifier`] fan-out with lazy eviction
//! - [`error`] -- [`DeliveryFailed`]

pub mod error;
pub mod handle;
pub mod notifier;
pub mod registry;

// Re-export primary types for convenience.
pub use error::DeliveryFailed;
pub use handle::ConnectionHandle;
pub use notifier::{DEFAULT_SEND_TIMEOUT, FanoutReport, Notifier};
pub use registry::{Registry, RegistryStats};
