//! Fan-out of push events to registered connections.
//!
//! Every operation follows the same shape:
//!
//! 1. Build the [`Event`] and encode it once.
//! 2. Snapshot the target handles from the [`Registry`].
//! 3. Write to all of them concurrently, each write bounded by the
//!    configured deadline.
//! 4. Evict every handle whose write failed, then close it.
//!
//! Delivery is best-effort and at-most-once per live handle. Nothing is
//! queued for later and nothing is retried. A failed write never surfaces
//! to the caller; it is logged, and the handle is evicted and closed so the
//! peer sees its connection end, reconnects, and registers again.

use std::sync::Arc;
use std::time::Duration;

use courier_types::{DriverId, DriverLocation, Event, OrderId, RestaurantId};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::DeliveryFailed;
use crate::handle::ConnectionHandle;
use crate::registry::Registry;

/// Default per-write deadline.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    /// Handles a write was attempted on.
    pub attempted: usize,
    /// Writes that completed.
    pub delivered: usize,
    /// Handles removed from the registry after a failed write.
    pub evicted: usize,
}

/// Pushes events to drivers, restaurant dashboards, and order watchers.
#[derive(Clone)]
pub struct Notifier {
    registry: Arc<Registry>,
    send_timeout: Duration,
}

impl Notifier {
    /// Create a notifier over `registry` with the default write deadline.
    pub const fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Override the per-write deadline.
    #[must_use]
    pub const fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// The registry this notifier delivers through.
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The per-write deadline.
    pub const fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Push `event` to `driver_id`'s connection, if it has one.
    ///
    /// On failure the driver's connection is evicted and closed. If the
    /// driver reconnected while the write was in flight, the new connection
    /// stays.
    pub async fn notify_driver(&self, driver_id: DriverId, event: &Event) -> FanoutReport {
        let Some(text) = encode(event) else {
            return FanoutReport::default();
        };
        let Some(handle) = self.registry.driver_handle(driver_id).await else {
            return FanoutReport::default();
        };

        let mut report = FanoutReport {
            attempted: 1,
            ..FanoutReport::default()
        };
        match handle.send_text(text, self.send_timeout).await {
            Ok(()) => report.delivered = 1,
            Err(e) => {
                log_failure(&handle, event, &e);
                if self
                    .registry
                    .unregister_driver_connection(driver_id, handle.id())
                    .await
                {
                    report.evicted = 1;
                }
                handle.close(self.send_timeout).await;
            }
        }
        report
    }

    /// Push `event` to every dashboard watching `restaurant_id`.
    pub async fn notify_restaurant(&self, restaurant_id: RestaurantId, event: &Event) -> FanoutReport {
        let Some(text) = encode(event) else {
            return FanoutReport::default();
        };
        let handles = self.registry.restaurant_handles(restaurant_id).await;
        let targets = keyed(restaurant_id, handles);
        let (mut report, failed) = self.deliver(&targets, &text, event).await;

        if !failed.is_empty() {
            let ids: Vec<_> = failed.iter().map(|(_, h)| h.id()).collect();
            report.evicted = self
                .registry
                .remove_restaurant_connections(restaurant_id, &ids)
                .await;
            self.close_all(&failed).await;
        }
        report
    }

    /// Push a `new_order` event carrying `payload` to every connected driver.
    ///
    /// All online drivers are candidates; filtering by zone or availability
    /// is up to the caller. With no drivers connected this is a no-op.
    pub async fn broadcast_new_order(&self, payload: Value) -> FanoutReport {
        let event = Event::new_order(payload);
        let Some(text) = encode(&event) else {
            return FanoutReport::default();
        };
        let targets = self.registry.all_driver_handles().await;
        let (mut report, failed) = self.deliver(&targets, &text, &event).await;

        for (driver_id, handle) in &failed {
            if self
                .registry
                .unregister_driver_connection(*driver_id, handle.id())
                .await
            {
                report.evicted = report.evicted.saturating_add(1);
            }
        }
        self.close_all(&failed).await;

        debug!(
            drivers = report.attempted,
            delivered = report.delivered,
            evicted = report.evicted,
            "new order broadcast"
        );
        report
    }

    /// Push an `order_update` event to every watcher of `order_id`.
    pub async fn notify_order_update(
        &self,
        order_id: OrderId,
        status: &str,
        driver_location: Option<DriverLocation>,
    ) -> FanoutReport {
        let event = Event::order_update(order_id, status, driver_location);
        let Some(text) = encode(&event) else {
            return FanoutReport::default();
        };
        let handles = self.registry.order_watcher_handles(order_id).await;
        let targets = keyed(order_id, handles);
        let (mut report, failed) = self.deliver(&targets, &text, &event).await;

        if !failed.is_empty() {
            let ids: Vec<_> = failed.iter().map(|(_, h)| h.id()).collect();
            report.evicted = self.registry.remove_order_watchers(order_id, &ids).await;
            self.close_all(&failed).await;
        }
        report
    }

    /// Write `text` to every target concurrently.
    ///
    /// Returns the report (without evictions) and the targets whose write
    /// failed, still paired with their key.
    async fn deliver<K: Copy>(
        &self,
        targets: &[(K, ConnectionHandle)],
        text: &str,
        event: &Event,
    ) -> (FanoutReport, Vec<(K, ConnectionHandle)>) {
        let writes = targets
            .iter()
            .map(|(_, handle)| handle.send_text(text.to_owned(), self.send_timeout));
        let results = join_all(writes).await;

        let mut failed = Vec::new();
        for ((key, handle), result) in targets.iter().zip(results) {
            if let Err(e) = result {
                log_failure(handle, event, &e);
                failed.push((*key, handle.clone()));
            }
        }

        let report = FanoutReport {
            attempted: targets.len(),
            delivered: targets.len().saturating_sub(failed.len()),
            evicted: 0,
        };
        (report, failed)
    }

    /// Close every failed handle so its peer sees the connection end.
    async fn close_all<K>(&self, failed: &[(K, ConnectionHandle)]) {
        join_all(failed.iter().map(|(_, handle)| handle.close(self.send_timeout))).await;
    }
}

fn keyed<K: Copy>(key: K, handles: Vec<ConnectionHandle>) -> Vec<(K, ConnectionHandle)> {
    handles.into_iter().map(|handle| (key, handle)).collect()
}

fn encode(event: &Event) -> Option<String> {
    match event.to_json() {
        Ok(text) => Some(text),
        Err(e) => {
            let e = DeliveryFailed::from(e);
            warn!(event = event.kind(), error = %e, "event not delivered");
            None
        }
    }
}

fn log_failure(handle: &ConnectionHandle, event: &Event, error: &DeliveryFailed) {
    debug!(
        connection = %handle.id(),
        event = event.kind(),
        %error,
        "delivery failed, evicting connection"
    );
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use futures::channel::mpsc;
    use futures::{FutureExt, StreamExt};
    use serde_json::json;

    use super::*;

    fn notifier() -> Notifier {
        Notifier::new(Arc::new(Registry::new())).with_send_timeout(Duration::from_millis(100))
    }

    fn next_json(rx: &mut mpsc::Receiver<String>) -> Option<Value> {
        rx.next()
            .now_or_never()
            .flatten()
            .and_then(|text| serde_json::from_str(&text).ok())
    }

    #[tokio::test]
    async fn notify_driver_targets_latest_handle_only() {
        let notifier = notifier();
        let (first, mut first_rx) = ConnectionHandle::channel(4);
        let (second, mut second_rx) = ConnectionHandle::channel(4);
        notifier.registry().register_driver(DriverId(42), first).await;
        notifier.registry().register_driver(DriverId(42), second).await;

        let report = notifier.notify_driver(DriverId(42), &Event::Ping).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(next_json(&mut second_rx), Some(json!({"type": "ping"})));
        assert_eq!(next_json(&mut first_rx), None);
    }

    #[tokio::test]
    async fn notify_driver_without_connection_is_noop() {
        let report = notifier().notify_driver(DriverId(1), &Event::Ping).await;
        assert_eq!(report, FanoutReport::default());
    }

    #[tokio::test]
    async fn notify_driver_evicts_dead_connection() {
        let notifier = notifier();
        let (handle, rx) = ConnectionHandle::channel(4);
        let receive_loop = handle.clone();
        notifier.registry().register_driver(DriverId(3), handle).await;
        drop(rx);

        let report = notifier.notify_driver(DriverId(3), &Event::Ping).await;

        assert_eq!(
            report,
            FanoutReport {
                attempted: 1,
                delivered: 0,
                evicted: 1,
            }
        );
        assert_eq!(notifier.registry().driver_count().await, 0);
        assert!(receive_loop.is_closed());
    }

    #[tokio::test]
    async fn restaurant_failure_is_isolated() {
        let notifier = notifier();
        let restaurant = RestaurantId(11);
        let (a, mut a_rx) = ConnectionHandle::channel(4);
        let (b, b_rx) = ConnectionHandle::channel(4);
        let (c, mut c_rx) = ConnectionHandle::channel(4);
        for handle in [a, b, c] {
            notifier.registry().register_restaurant(restaurant, handle).await;
        }
        drop(b_rx);

        let event = Event::new_order(json!({"id": 5}));
        let report = notifier.notify_restaurant(restaurant, &event).await;

        assert_eq!(
            report,
            FanoutReport {
                attempted: 3,
                delivered: 2,
                evicted: 1,
            }
        );
        assert_eq!(notifier.registry().restaurant_connection_count(restaurant).await, 2);
        assert_eq!(next_json(&mut a_rx).unwrap()["data"]["id"], 5);
        assert_eq!(next_json(&mut c_rx).unwrap()["data"]["id"], 5);
    }

    #[tokio::test]
    async fn slow_peer_times_out_and_is_evicted() {
        let notifier = notifier();
        let restaurant = RestaurantId(2);
        let (stalled, _stalled_rx) = ConnectionHandle::channel(0);
        let (healthy, mut healthy_rx) = ConnectionHandle::channel(4);
        let stalled_loop = stalled.clone();
        let healthy_loop = healthy.clone();
        notifier.registry().register_restaurant(restaurant, stalled).await;
        notifier.registry().register_restaurant(restaurant, healthy).await;

        let report = notifier.notify_restaurant(restaurant, &Event::Ping).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.evicted, 1);
        assert!(next_json(&mut healthy_rx).is_some());
        assert_eq!(notifier.registry().restaurant_connection_count(restaurant).await, 1);
        assert!(stalled_loop.is_closed());
        assert!(!healthy_loop.is_closed());
    }

    #[tokio::test]
    async fn broadcast_with_no_drivers_is_noop() {
        let report = notifier().broadcast_new_order(json!({"id": 1})).await;
        assert_eq!(report, FanoutReport::default());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_driver_and_prunes_failures() {
        let notifier = notifier();
        let (d1, mut d1_rx) = ConnectionHandle::channel(4);
        let (d2, d2_rx) = ConnectionHandle::channel(4);
        let (d3, mut d3_rx) = ConnectionHandle::channel(4);
        let d2_loop = d2.clone();
        notifier.registry().register_driver(DriverId(1), d1).await;
        notifier.registry().register_driver(DriverId(2), d2).await;
        notifier.registry().register_driver(DriverId(3), d3).await;
        drop(d2_rx);

        let report = notifier.broadcast_new_order(json!({"id": 7})).await;

        assert_eq!(
            report,
            FanoutReport {
                attempted: 3,
                delivered: 2,
                evicted: 1,
            }
        );
        let expected = json!({"type": "new_order", "data": {"id": 7}});
        assert_eq!(next_json(&mut d1_rx), Some(expected.clone()));
        assert_eq!(next_json(&mut d3_rx), Some(expected));
        assert_eq!(notifier.registry().driver_handle(DriverId(2)).await, None);
        assert_eq!(notifier.registry().driver_count().await, 2);
        assert!(d2_loop.is_closed());
    }

    #[tokio::test]
    async fn failed_write_closes_connection_even_after_replacement() {
        let notifier = notifier();
        let (stale, stale_rx) = ConnectionHandle::channel(4);
        let stale_loop = stale.clone();
        notifier.registry().register_driver(DriverId(5), stale).await;
        drop(stale_rx);

        // The driver reconnects after the snapshot was taken.
        let targets = notifier.registry().all_driver_handles().await;
        let (fresh, _fresh_rx) = ConnectionHandle::channel(4);
        notifier.registry().register_driver(DriverId(5), fresh.clone()).await;

        let (report, failed) = notifier.deliver(&targets, "{}", &Event::Ping).await;
        assert_eq!(report.delivered, 0);
        assert_eq!(failed.len(), 1);
        notifier.close_all(&failed).await;

        assert!(stale_loop.is_closed());
        assert!(!fresh.is_closed());
        assert_eq!(notifier.registry().driver_handle(DriverId(5)).await, Some(fresh));
    }

    #[tokio::test]
    async fn order_update_carries_status_and_location() {
        let notifier = notifier();
        let (watcher, mut rx) = ConnectionHandle::channel(4);
        notifier.registry().register_order_watcher(OrderId(99), watcher).await;

        let location = DriverLocation {
            lat: 10.5,
            lng: 20.25,
        };
        let report = notifier
            .notify_order_update(OrderId(99), "on_the_way", Some(location))
            .await;

        assert_eq!(report.delivered, 1);
        assert_eq!(
            next_json(&mut rx),
            Some(json!({
                "type": "order_update",
                "order_id": 99,
                "status": "on_the_way",
                "driver_location": {"lat": 10.5, "lng": 20.25},
            }))
        );
    }

    #[tokio::test]
    async fn order_update_prunes_last_watcher() {
        let notifier = notifier();
        let (watcher, rx) = ConnectionHandle::channel(4);
        notifier.registry().register_order_watcher(OrderId(4), watcher).await;
        drop(rx);

        let report = notifier.notify_order_update(OrderId(4), "delivered", None).await;

        assert_eq!(report.evicted, 1);
        assert_eq!(notifier.registry().stats().await.orders, 0);
    }

    #[tokio::test]
    async fn per_handle_order_is_preserved() {
        let notifier = notifier();
        let (watcher, mut rx) = ConnectionHandle::channel(8);
        notifier.registry().register_order_watcher(OrderId(1), watcher).await;

        for status in ["accepted", "preparing", "picked_up"] {
            notifier.notify_order_update(OrderId(1), status, None).await;
        }

        let statuses: Vec<_> = std::iter::from_fn(|| next_json(&mut rx))
            .map(|v| v["status"].as_str().unwrap_or_default().to_owned())
            .collect();
        assert_eq!(statuses, ["accepted", "preparing", "picked_up"]);
    }

    #[tokio::test]
    async fn receiver_sees_frames_in_stream_order() {
        let notifier = notifier();
        let (handle, mut rx) = ConnectionHandle::channel(4);
        notifier.registry().register_driver(DriverId(8), handle).await;

        notifier.broadcast_new_order(json!({"id": 1})).await;
        notifier.broadcast_new_order(json!({"id": 2})).await;

        let first = rx.next().await.unwrap();
        let second = rx.next().await.unwrap();
        assert!(first.contains(r#""id":1"#));
        assert!(second.contains(r#""id":2"#));
    }
}
