//! `WebSocket` handlers for the three audiences.
//!
//! | Route | Audience | Registered as |
//! |-------|----------|---------------|
//! | `GET /ws/driver/{driver_id}` | Driver app | sole connection for the driver |
//! | `GET /ws/restaurant/{restaurant_id}` | Restaurant dashboard | one of the restaurant's dashboards |
//! | `GET /ws/order/{order_id}` | Order tracking page | one of the order's watchers |
//!
//! Each accepted socket is split. The write half becomes a
//! [`ConnectionHandle`] registered under the audience key; the read half
//! drives the receive loop on this task. The loop answers
//! `{"type":"ping"}` with `{"type":"pong"}` on the same handle and ignores
//! everything else. When the peer closes, the transport fails, or the
//! notifier closes the handle after a failed write, the handle is
//! unregistered and the task ends, dropping the socket.
//!
//! A connection moves `Connecting -> Open -> Closed` exactly once. A
//! reconnecting peer is a new connection that registers again.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use courier_hub::{ConnectionHandle, Registry};
use courier_types::{DriverId, Event, InboundFrame, OrderId, RestaurantId};
use futures::{SinkExt, StreamExt, future};
use tracing::{debug, info};

use crate::state::AppState;

/// Which audience a socket belongs to, with its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// A delivery driver.
    Driver(DriverId),
    /// A restaurant dashboard.
    Restaurant(RestaurantId),
    /// A customer or admin tracking an order.
    Order(OrderId),
}

impl Audience {
    async fn register(self, registry: &Registry, handle: ConnectionHandle) {
        match self {
            Self::Driver(id) => registry.register_driver(id, handle).await,
            Self::Restaurant(id) => registry.register_restaurant(id, handle).await,
            Self::Order(id) => registry.register_order_watcher(id, handle).await,
        }
    }

    async fn unregister(self, registry: &Registry, handle: &ConnectionHandle) {
        match self {
            // Only this connection; a newer one for the same driver stays.
            Self::Driver(id) => {
                registry.unregister_driver_connection(id, handle.id()).await;
            }
            Self::Restaurant(id) => registry.unregister_restaurant(id, handle).await,
            Self::Order(id) => registry.unregister_order_watcher(id, handle).await,
        }
    }
}

impl core::fmt::Display for Audience {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Driver(id) => write!(f, "driver:{id}"),
            Self::Restaurant(id) => write!(f, "restaurant:{id}"),
            Self::Order(id) => write!(f, "order:{id}"),
        }
    }
}

/// Accept a driver connection.
///
/// # Route
///
/// `GET /ws/driver/{driver_id}`
pub async fn ws_driver(
    ws: WebSocketUpgrade,
    Path(driver_id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let audience = Audience::Driver(DriverId(driver_id));
    ws.on_upgrade(move |socket| handle_socket(socket, state, audience))
}

/// Accept a restaurant dashboard connection.
///
/// # Route
///
/// `GET /ws/restaurant/{restaurant_id}`
pub async fn ws_restaurant(
    ws: WebSocketUpgrade,
    Path(restaurant_id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let audience = Audience::Restaurant(RestaurantId(restaurant_id));
    ws.on_upgrade(move |socket| handle_socket(socket, state, audience))
}

/// Accept an order tracking connection.
///
/// # Route
///
/// `GET /ws/order/{order_id}`
pub async fn ws_order(
    ws: WebSocketUpgrade,
    Path(order_id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let audience = Audience::Order(OrderId(order_id));
    ws.on_upgrade(move |socket| handle_socket(socket, state, audience))
}

/// Handle the `WebSocket` lifecycle for one peer.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, audience: Audience) {
    let (sink, mut stream) = socket.split();
    let sink = sink.with(|text: String| {
        future::ready(Ok::<_, axum::Error>(Message::Text(text.into())))
    });
    let handle = ConnectionHandle::new(sink);
    let registry = state.registry();
    let send_timeout = state.notifier.send_timeout();

    audience.register(registry, handle.clone()).await;
    info!(%audience, connection = %handle.id(), "connection open");

    loop {
        let msg = tokio::select! {
            biased;
            () = handle.closed() => {
                debug!(%audience, "closed by server");
                break;
            }
            msg = stream.next() => msg,
        };
        let Some(msg) = msg else { break };
        match msg {
            Ok(Message::Text(text)) => match InboundFrame::classify(text.as_str()) {
                InboundFrame::Ping => {
                    if let Err(e) = handle.send(&Event::Pong, send_timeout).await {
                        debug!(%audience, error = %e, "pong failed");
                        break;
                    }
                }
                InboundFrame::Ignored => {
                    debug!(%audience, "ignoring inbound frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                // Binary frames are ignored; transport pings are answered by
                // the protocol layer.
            }
            Err(e) => {
                debug!(%audience, error = %e, "WebSocket error");
                break;
            }
        }
    }

    audience.unregister(registry, &handle).await;
    info!(%audience, connection = %handle.id(), "connection closed");
}
