//! End-to-end `WebSocket` tests using a real client against a gateway bound
//! to an ephemeral local port.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use courier_gateway::server::spawn_gateway;
use courier_gateway::state::AppState;
use courier_hub::{Notifier, Registry, RegistryStats};
use courier_types::{DriverId, Event, OrderId, RestaurantId};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// How long to wait for a frame that should arrive.
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait before concluding that no frame is coming.
const QUIET_PERIOD: Duration = Duration::from_millis(150);

async fn boot_gateway() -> (SocketAddr, Arc<AppState>) {
    boot_gateway_with(AppState::default()).await
}

async fn boot_gateway_with(state: AppState) -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (addr, _handle) = spawn_gateway(listener, Arc::clone(&state)).unwrap();
    (addr, state)
}

async fn connect(addr: SocketAddr, path: &str) -> WsStream {
    let (ws, _response) = connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("WebSocket handshake failed");
    ws
}

/// Poll the registry until `check` holds, failing the test after two seconds.
async fn wait_for_stats(registry: &Registry, check: impl Fn(&RegistryStats) -> bool) {
    let polled = timeout(RECV_TIMEOUT, async {
        while !check(&registry.stats().await) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "registry did not reach expected state in time");
}

async fn next_json(ws: &mut WsStream, wait: Duration) -> Option<Value> {
    loop {
        match timeout(wait, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return serde_json::from_str(text.as_str()).ok(),
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
            _ => return None,
        }
    }
}

async fn send_text(ws: &mut WsStream, text: &str) {
    ws.send(Message::text(text.to_owned())).await.unwrap();
}

#[tokio::test]
async fn driver_receives_broadcast_until_disconnect() {
    let (addr, state) = boot_gateway().await;
    let registry = Arc::clone(state.registry());

    let mut driver = connect(addr, "/ws/driver/42").await;
    wait_for_stats(&registry, |s| s.drivers == 1).await;

    let report = state.notifier.broadcast_new_order(json!({"id": 7})).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(
        next_json(&mut driver, RECV_TIMEOUT).await,
        Some(json!({"type": "new_order", "data": {"id": 7}}))
    );

    driver.close(None).await.unwrap();
    wait_for_stats(&registry, |s| s.drivers == 0).await;

    let report = state.notifier.broadcast_new_order(json!({"id": 7})).await;
    assert_eq!(report.attempted, 0);
}

#[tokio::test]
async fn ping_yields_exactly_one_pong_on_every_channel() {
    let (addr, state) = boot_gateway().await;
    let registry = Arc::clone(state.registry());

    for path in ["/ws/driver/1", "/ws/restaurant/2", "/ws/order/3"] {
        let mut ws = connect(addr, path).await;
        wait_for_stats(&registry, |s| *s != RegistryStats::default()).await;
        let before = registry.stats().await;

        send_text(&mut ws, r#"{"type":"ping"}"#).await;

        assert_eq!(next_json(&mut ws, RECV_TIMEOUT).await, Some(json!({"type": "pong"})));
        assert_eq!(next_json(&mut ws, QUIET_PERIOD).await, None, "second frame on {path}");
        assert_eq!(registry.stats().await, before);

        ws.close(None).await.unwrap();
        wait_for_stats(&registry, |s| *s == RegistryStats::default()).await;
    }
}

#[tokio::test]
async fn malformed_and_unknown_frames_are_ignored() {
    let (addr, state) = boot_gateway().await;
    let registry = Arc::clone(state.registry());

    let mut ws = connect(addr, "/ws/order/9").await;
    wait_for_stats(&registry, |s| s.order_watchers == 1).await;

    send_text(&mut ws, "not json").await;
    send_text(&mut ws, r#"{"type":"accept_order","order_id":9}"#).await;
    send_text(&mut ws, r#"["ping"]"#).await;
    ws.send(Message::binary(vec![1_u8, 2, 3])).await.unwrap();
    assert_eq!(next_json(&mut ws, QUIET_PERIOD).await, None);

    send_text(&mut ws, r#"{"type":"ping"}"#).await;
    assert_eq!(next_json(&mut ws, RECV_TIMEOUT).await, Some(json!({"type": "pong"})));
    assert_eq!(registry.order_watcher_count(OrderId(9)).await, 1);
}

#[tokio::test]
async fn restaurant_disconnect_leaves_sibling_dashboards() {
    let (addr, state) = boot_gateway().await;
    let registry = Arc::clone(state.registry());
    let restaurant = RestaurantId(5);

    let mut kitchen = connect(addr, "/ws/restaurant/5").await;
    let mut front = connect(addr, "/ws/restaurant/5").await;
    wait_for_stats(&registry, |s| s.restaurant_connections == 2).await;

    kitchen.close(None).await.unwrap();
    wait_for_stats(&registry, |s| s.restaurant_connections == 1).await;

    let event = Event::new_order(json!({"id": 11}));
    let report = state.notifier.notify_restaurant(restaurant, &event).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(
        next_json(&mut front, RECV_TIMEOUT).await,
        Some(json!({"type": "new_order", "data": {"id": 11}}))
    );
}

#[tokio::test]
async fn driver_reconnect_replaces_previous_connection() {
    let (addr, state) = boot_gateway().await;
    let registry = Arc::clone(state.registry());

    let mut first = connect(addr, "/ws/driver/8").await;
    wait_for_stats(&registry, |s| s.drivers == 1).await;
    let first_id = registry.driver_handle(DriverId(8)).await.unwrap().id();

    let mut second = connect(addr, "/ws/driver/8").await;
    let replaced = timeout(RECV_TIMEOUT, async {
        while registry
            .driver_handle(DriverId(8))
            .await
            .is_none_or(|h| h.id() == first_id)
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(replaced.is_ok(), "second driver connection never registered");

    state.notifier.notify_driver(DriverId(8), &Event::Ping).await;
    assert_eq!(next_json(&mut second, RECV_TIMEOUT).await, Some(json!({"type": "ping"})));
    assert_eq!(next_json(&mut first, QUIET_PERIOD).await, None);

    // The stale connection closing must not remove the live one.
    first.close(None).await.unwrap();
    tokio::time::sleep(QUIET_PERIOD).await;
    assert_eq!(registry.driver_count().await, 1);

    state.notifier.notify_driver(DriverId(8), &Event::Ping).await;
    assert_eq!(next_json(&mut second, RECV_TIMEOUT).await, Some(json!({"type": "ping"})));
}

#[tokio::test]
async fn order_watchers_receive_status_updates() {
    let (addr, state) = boot_gateway().await;
    let registry = Arc::clone(state.registry());

    let mut tracker = connect(addr, "/ws/order/77").await;
    wait_for_stats(&registry, |s| s.order_watchers == 1).await;

    let report = state
        .notifier
        .notify_order_update(OrderId(77), "delivered", None)
        .await;
    assert_eq!(report.delivered, 1);
    assert_eq!(
        next_json(&mut tracker, RECV_TIMEOUT).await,
        Some(json!({
            "type": "order_update",
            "order_id": 77,
            "status": "delivered",
            "driver_location": null,
        }))
    );
}

#[tokio::test]
async fn evicted_driver_is_disconnected() {
    let notifier =
        Notifier::new(Arc::new(Registry::new())).with_send_timeout(Duration::from_millis(50));
    let (addr, state) = boot_gateway_with(AppState::new(notifier)).await;
    let registry = Arc::clone(state.registry());

    let mut driver = connect(addr, "/ws/driver/42").await;
    wait_for_stats(&registry, |s| s.drivers == 1).await;

    // The client is not reading, so a frame this large stalls the write.
    let blob = "x".repeat(4_194_304);
    let report = state.notifier.broadcast_new_order(json!({ "blob": blob })).await;
    assert_eq!(report.evicted, 1);
    assert_eq!(registry.driver_count().await, 0);

    // The server may already have dropped the socket.
    let _ = driver.send(Message::text(r#"{"type":"ping"}"#.to_owned())).await;

    let ended = timeout(RECV_TIMEOUT, async {
        loop {
            match driver.next().await {
                Some(Ok(Message::Text(text))) => {
                    assert!(!text.as_str().contains("pong"), "evicted connection answered ping");
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "evicted connection stayed open");
}
