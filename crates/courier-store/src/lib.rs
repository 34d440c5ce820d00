//! Ephemeral state store for the Courier real-time gateway.
//!
//! Shopping carts and short-lived conversational sessions live in a
//! `Dragonfly` (Redis-compatible) instance with a per-key time-to-live.
//! Values are JSON snapshots, overwritten wholesale on every update and
//! never locked.
//!
//! # Modules
//!
//! - [`dragonfly`] -- [`StateStore`] client and key conventions
//! - [`model`] -- [`CartItem`] and [`SessionState`] value types
//! - [`error`] -- [`StoreError`]

pub mod dragonfly;
pub mod error;
pub mod model;

// Re-export primary types for convenience.
pub use dragonfly::{StateStore, StoreTtl, cart_key, session_key};
pub use error::StoreError;
pub use model::{CartItem, SessionState};
