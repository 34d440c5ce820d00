//! Shared type definitions for the Courier real-time gateway.
//!
//! Every crate in the workspace speaks in terms of the identifiers and
//! events defined here. Types flow downstream to `TypeScript` via `ts-rs`
//! for the restaurant dashboard and the order tracking page.
//!
//! # Modules
//!
//! - [`ids`] -- Audience identifiers (driver, restaurant, order) and
//!   per-connection identifiers
//! - [`event`] -- Outbound push events and the driver location payload
//! - [`frame`] -- Classification of inbound client frames

pub mod event;
pub mod frame;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use event::{DriverLocation, Event};
pub use frame::InboundFrame;
pub use ids::{ConnectionId, DriverId, OrderId, RestaurantId};
