//! REST endpoint handlers for the gateway.
//!
//! The `/api/notify` endpoints are how the order service (restaurants,
//! menus, orders CRUD) reaches the fan-out notifier. They always answer
//! `200` with a [`FanoutReport`]; push failures are never an HTTP error.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness probe |
//! | `GET` | `/api/connections` | Live connection counts per audience |
//! | `POST` | `/api/notify/orders` | Broadcast a new order to every driver |
//! | `POST` | `/api/notify/orders/{order_id}/status` | Push a status update to the order's watchers |
//! | `POST` | `/api/notify/restaurants/{restaurant_id}` | Push an event to a restaurant's dashboards |
//! | `POST` | `/api/notify/drivers/{driver_id}` | Push an event to one driver |
//! | `GET` | `/api/cart/{user_id}` | Read a cart |
//! | `PUT` | `/api/cart/{user_id}` | Replace a cart |
//! | `POST` | `/api/cart/{user_id}/items` | Add one line to a cart |
//! | `DELETE` | `/api/cart/{user_id}` | Clear a cart |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use courier_hub::{FanoutReport, RegistryStats};
use courier_store::CartItem;
use courier_types::{DriverId, DriverLocation, Event, OrderId, RestaurantId};
use serde_json::Value;
use tracing::info;

use crate::error::GatewayError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/notify/orders/{order_id}/status`.
#[derive(Debug, serde::Deserialize)]
pub struct OrderStatusRequest {
    /// The new status label.
    pub status: String,
    /// The driver's current position, if known.
    #[serde(default)]
    pub driver_location: Option<DriverLocation>,
}

// ---------------------------------------------------------------------------
// Health and stats
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Live connection counts per audience.
pub async fn connections(State(state): State<Arc<AppState>>) -> Json<RegistryStats> {
    Json(state.registry().stats().await)
}

// ---------------------------------------------------------------------------
// Producer endpoints
// ---------------------------------------------------------------------------

/// Broadcast a `new_order` event carrying the request body to every driver.
pub async fn broadcast_new_order(
    State(state): State<Arc<AppState>>,
    Json(order): Json<Value>,
) -> Json<FanoutReport> {
    let report = state.notifier.broadcast_new_order(order).await;
    info!(
        drivers = report.attempted,
        delivered = report.delivered,
        "new order dispatched to drivers"
    );
    Json(report)
}

/// Push an `order_update` event to the watchers of an order.
pub async fn order_status(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
    Json(body): Json<OrderStatusRequest>,
) -> Result<Json<FanoutReport>, GatewayError> {
    let status = body.status.trim();
    if status.is_empty() {
        return Err(GatewayError::InvalidRequest(String::from(
            "status must not be empty",
        )));
    }

    let report = state
        .notifier
        .notify_order_update(OrderId(order_id), status, body.driver_location)
        .await;
    Ok(Json(report))
}

/// Push an arbitrary event to every dashboard of a restaurant.
pub async fn notify_restaurant(
    State(state): State<Arc<AppState>>,
    Path(restaurant_id): Path<i64>,
    Json(event): Json<Event>,
) -> Json<FanoutReport> {
    Json(
        state
            .notifier
            .notify_restaurant(RestaurantId(restaurant_id), &event)
            .await,
    )
}

/// Push an arbitrary event to one driver.
pub async fn notify_driver(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<i64>,
    Json(event): Json<Event>,
) -> Json<FanoutReport> {
    Json(state.notifier.notify_driver(DriverId(driver_id), &event).await)
}

// ---------------------------------------------------------------------------
// Carts
// ---------------------------------------------------------------------------

/// Read a user's cart. Missing or expired carts are empty.
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<CartItem>>, GatewayError> {
    Ok(Json(state.store()?.get_cart(user_id).await?))
}

/// Replace a user's cart.
pub async fn put_cart(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Json(items): Json<Vec<CartItem>>,
) -> Result<Json<Vec<CartItem>>, GatewayError> {
    if items.iter().any(|item| item.quantity == 0) {
        return Err(GatewayError::InvalidRequest(String::from(
            "quantity must be at least 1",
        )));
    }
    state.store()?.set_cart(user_id, &items).await?;
    Ok(Json(items))
}

/// Add one line to a user's cart and return the updated cart.
pub async fn add_cart_item(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Json(item): Json<CartItem>,
) -> Result<Json<Vec<CartItem>>, GatewayError> {
    if item.quantity == 0 {
        return Err(GatewayError::InvalidRequest(String::from(
            "quantity must be at least 1",
        )));
    }
    Ok(Json(state.store()?.add_to_cart(user_id, item).await?))
}

/// Clear a user's cart.
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, GatewayError> {
    state.store()?.clear_cart(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
