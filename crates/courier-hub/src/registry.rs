//! In-memory registry of live connections, one map per audience.
//!
//! | Audience | Key | Value |
//! |----------|-----|-------|
//! | Drivers | [`DriverId`] | exactly one [`ConnectionHandle`] (last writer wins) |
//! | Restaurants | [`RestaurantId`] | set of handles (one per dashboard) |
//! | Order watchers | [`OrderId`] | set of handles (one per tracking page) |
//!
//! Each audience map sits behind its own [`RwLock`]. Locks are never held
//! across network I/O: fan-out reads clone the handles out, release the
//! lock, write, and come back to remove whatever failed.
//!
//! A key is present only while at least one handle is registered under it.
//! Removing the last handle of a set removes the key.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use courier_types::{ConnectionId, DriverId, OrderId, RestaurantId};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::handle::ConnectionHandle;

/// Connection counts per audience.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Drivers with a live connection.
    pub drivers: usize,
    /// Restaurants with at least one live dashboard.
    pub restaurants: usize,
    /// Total live restaurant dashboard connections.
    pub restaurant_connections: usize,
    /// Orders with at least one watcher.
    pub orders: usize,
    /// Total live order watcher connections.
    pub order_watchers: usize,
}

/// Keyed sets of handles for the multi-connection audiences.
struct HandleSets<K> {
    sets: RwLock<BTreeMap<K, BTreeMap<ConnectionId, ConnectionHandle>>>,
}

impl<K: Ord + Copy> HandleSets<K> {
    fn new() -> Self {
        Self {
            sets: RwLock::new(BTreeMap::new()),
        }
    }

    async fn insert(&self, key: K, handle: ConnectionHandle) {
        let mut sets = self.sets.write().await;
        sets.entry(key).or_default().insert(handle.id(), handle);
    }

    /// Remove the listed connections from `key`'s set, dropping the set if it
    /// empties. Returns how many were actually removed.
    async fn remove(&self, key: K, ids: &[ConnectionId]) -> usize {
        let mut sets = self.sets.write().await;
        let Entry::Occupied(mut entry) = sets.entry(key) else {
            return 0;
        };
        let removed = ids
            .iter()
            .filter(|id| entry.get_mut().remove(*id).is_some())
            .count();
        if entry.get().is_empty() {
            entry.remove();
        }
        removed
    }

    async fn snapshot(&self, key: K) -> Vec<ConnectionHandle> {
        self.sets
            .read()
            .await
            .get(&key)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    async fn count(&self, key: K) -> usize {
        self.sets.read().await.get(&key).map_or(0, BTreeMap::len)
    }

    /// Number of keys and total handles.
    async fn totals(&self) -> (usize, usize) {
        let sets = self.sets.read().await;
        (sets.len(), sets.values().map(BTreeMap::len).sum())
    }
}

/// Registry of live connections for drivers, restaurants, and order watchers.
///
/// Constructed explicitly and shared via [`Arc`](std::sync::Arc); there is no
/// global instance. Ids are accepted without validation.
pub struct Registry {
    drivers: RwLock<BTreeMap<DriverId, ConnectionHandle>>,
    restaurants: HandleSets<RestaurantId>,
    order_watchers: HandleSets<OrderId>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            drivers: RwLock::new(BTreeMap::new()),
            restaurants: HandleSets::new(),
            order_watchers: HandleSets::new(),
        }
    }

    // =========================================================================
    // Drivers
    // =========================================================================

    /// Install `handle` as the only connection for `driver_id`.
    ///
    /// A previously registered handle is dropped from the registry without
    /// being closed; its peer simply stops receiving driver events.
    pub async fn register_driver(&self, driver_id: DriverId, handle: ConnectionHandle) {
        let connection = handle.id();
        let replaced = self.drivers.write().await.insert(driver_id, handle);
        if let Some(old) = replaced {
            debug!(%driver_id, old = %old.id(), new = %connection, "driver connection replaced");
        } else {
            debug!(%driver_id, %connection, "driver registered");
        }
    }

    /// Remove whatever connection is registered for `driver_id`.
    ///
    /// Unregistering a driver that is not registered is a no-op.
    pub async fn unregister_driver(&self, driver_id: DriverId) {
        if self.drivers.write().await.remove(&driver_id).is_some() {
            debug!(%driver_id, "driver unregistered");
        }
    }

    /// Remove the driver's mapping only if it still points at `connection`.
    ///
    /// Returns `true` if the mapping was removed. A connection that has
    /// already been replaced by a newer one leaves the newer one in place.
    pub async fn unregister_driver_connection(
        &self,
        driver_id: DriverId,
        connection: ConnectionId,
    ) -> bool {
        let mut drivers = self.drivers.write().await;
        match drivers.entry(driver_id) {
            Entry::Occupied(entry) if entry.get().id() == connection => {
                entry.remove();
                debug!(%driver_id, %connection, "driver unregistered");
                true
            }
            _ => false,
        }
    }

    /// The handle currently registered for `driver_id`, if any.
    pub async fn driver_handle(&self, driver_id: DriverId) -> Option<ConnectionHandle> {
        self.drivers.read().await.get(&driver_id).cloned()
    }

    /// Every registered driver with its handle.
    pub async fn all_driver_handles(&self) -> Vec<(DriverId, ConnectionHandle)> {
        self.drivers
            .read()
            .await
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }

    /// Number of drivers with a live connection.
    pub async fn driver_count(&self) -> usize {
        self.drivers.read().await.len()
    }

    // =========================================================================
    // Restaurants
    // =========================================================================

    /// Add `handle` to the dashboards watching `restaurant_id`.
    pub async fn register_restaurant(&self, restaurant_id: RestaurantId, handle: ConnectionHandle) {
        debug!(%restaurant_id, connection = %handle.id(), "restaurant dashboard registered");
        self.restaurants.insert(restaurant_id, handle).await;
    }

    /// Remove `handle` from the dashboards watching `restaurant_id`.
    pub async fn unregister_restaurant(&self, restaurant_id: RestaurantId, handle: &ConnectionHandle) {
        self.remove_restaurant_connections(restaurant_id, &[handle.id()])
            .await;
    }

    /// Remove several connections from a restaurant's set at once.
    ///
    /// Returns the number of connections actually removed.
    pub async fn remove_restaurant_connections(
        &self,
        restaurant_id: RestaurantId,
        connections: &[ConnectionId],
    ) -> usize {
        let removed = self.restaurants.remove(restaurant_id, connections).await;
        if removed > 0 {
            debug!(%restaurant_id, removed, "restaurant dashboards unregistered");
        }
        removed
    }

    /// Snapshot of the handles watching `restaurant_id`.
    pub async fn restaurant_handles(&self, restaurant_id: RestaurantId) -> Vec<ConnectionHandle> {
        self.restaurants.snapshot(restaurant_id).await
    }

    /// Number of dashboards watching `restaurant_id`.
    pub async fn restaurant_connection_count(&self, restaurant_id: RestaurantId) -> usize {
        self.restaurants.count(restaurant_id).await
    }

    // =========================================================================
    // Order watchers
    // =========================================================================

    /// Add `handle` to the watchers of `order_id`.
    pub async fn register_order_watcher(&self, order_id: OrderId, handle: ConnectionHandle) {
        debug!(%order_id, connection = %handle.id(), "order watcher registered");
        self.order_watchers.insert(order_id, handle).await;
    }

    /// Remove `handle` from the watchers of `order_id`.
    pub async fn unregister_order_watcher(&self, order_id: OrderId, handle: &ConnectionHandle) {
        self.remove_order_watchers(order_id, &[handle.id()]).await;
    }

    /// Remove several connections from an order's watcher set at once.
    ///
    /// Returns the number of connections actually removed.
    pub async fn remove_order_watchers(
        &self,
        order_id: OrderId,
        connections: &[ConnectionId],
    ) -> usize {
        let removed = self.order_watchers.remove(order_id, connections).await;
        if removed > 0 {
            debug!(%order_id, removed, "order watchers unregistered");
        }
        removed
    }

    /// Snapshot of the handles watching `order_id`.
    pub async fn order_watcher_handles(&self, order_id: OrderId) -> Vec<ConnectionHandle> {
        self.order_watchers.snapshot(order_id).await
    }

    /// Number of connections watching `order_id`.
    pub async fn order_watcher_count(&self, order_id: OrderId) -> usize {
        self.order_watchers.count(order_id).await
    }

    // =========================================================================
    // Stats
    // =========================================================================

    /// Connection counts across all audiences.
    pub async fn stats(&self) -> RegistryStats {
        let drivers = self.driver_count().await;
        let (restaurants, restaurant_connections) = self.restaurants.totals().await;
        let (orders, order_watchers) = self.order_watchers.totals().await;
        RegistryStats {
            drivers,
            restaurants,
            restaurant_connections,
            orders,
            order_watchers,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
