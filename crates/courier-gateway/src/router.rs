//! Axum router construction for the gateway.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the gateway.
///
/// The router includes:
/// - `GET /ws/driver/{driver_id}` -- driver `WebSocket`
/// - `GET /ws/restaurant/{restaurant_id}` -- restaurant dashboard `WebSocket`
/// - `GET /ws/order/{order_id}` -- order tracking `WebSocket`
/// - `GET /health` -- liveness probe
/// - `GET /api/connections` -- connection counts
/// - `POST /api/notify/...` -- producer endpoints
/// - `/api/cart/{user_id}` -- cart endpoints
///
/// CORS is configured to allow any origin so the dashboard and tracking
/// page can be served from a different host.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket
        .route("/ws/driver/{driver_id}", get(ws::ws_driver))
        .route("/ws/restaurant/{restaurant_id}", get(ws::ws_restaurant))
        .route("/ws/order/{order_id}", get(ws::ws_order))
        // Health
        .route("/health", get(handlers::health))
        .route("/api/connections", get(handlers::connections))
        // Producers
        .route("/api/notify/orders", post(handlers::broadcast_new_order))
        .route(
            "/api/notify/orders/{order_id}/status",
            post(handlers::order_status),
        )
        .route(
            "/api/notify/restaurants/{restaurant_id}",
            post(handlers::notify_restaurant),
        )
        .route(
            "/api/notify/drivers/{driver_id}",
            post(handlers::notify_driver),
        )
        // Carts
        .route(
            "/api/cart/{user_id}",
            get(handlers::get_cart)
                .put(handlers::put_cart)
                .delete(handlers::clear_cart),
        )
        .route("/api/cart/{user_id}/items", post(handlers::add_cart_item))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
