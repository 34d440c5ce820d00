//! Outbound push events.
//!
//! An [`Event`] is built once per logical notification and never mutated
//! afterwards. The same value is serialized for every handle in a fan-out.
//!
//! # Wire Format
//!
//! | Variant | JSON |
//! |---------|------|
//! | [`Event::NewOrder`] | `{"type":"new_order","data":{...}}` |
//! | [`Event::OrderUpdate`] | `{"type":"order_update","order_id":7,"status":"picked_up","driver_location":{"lat":..,"lng":..}}` |
//! | [`Event::Ping`] | `{"type":"ping"}` |
//! | [`Event::Pong`] | `{"type":"pong"}` |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::ids::OrderId;

/// Last known position of the driver carrying an order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DriverLocation {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
}

/// A push event delivered over a duplex connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new order is available for dispatch.
    NewOrder {
        /// The order record as materialized by the order service.
        data: Value,
    },
    /// An order changed status, optionally with the driver's position.
    OrderUpdate {
        /// The order that changed.
        order_id: OrderId,
        /// The new status label (e.g. `preparing`, `picked_up`).
        status: String,
        /// The driver's position, or `null` when unknown.
        driver_location: Option<DriverLocation>,
    },
    /// Keep-alive probe.
    Ping,
    /// Keep-alive answer.
    Pong,
}

impl Event {
    /// Build a `new_order` event around an order payload.
    pub const fn new_order(data: Value) -> Self {
        Self::NewOrder { data }
    }

    /// Build an `order_update` event.
    pub fn order_update(
        order_id: OrderId,
        status: impl Into<String>,
        driver_location: Option<DriverLocation>,
    ) -> Self {
        Self::OrderUpdate {
            order_id,
            status: status.into(),
            driver_location,
        }
    }

    /// The wire `type` tag of this event.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NewOrder { .. } => "new_order",
            Self::OrderUpdate { .. } => "order_update",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }

    /// Serialize this event to its JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the payload cannot be encoded.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
