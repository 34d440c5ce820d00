//! Shared application state for the gateway.
//!
//! [`AppState`] is built once at startup and injected into every handler
//! via Axum's `State` extractor. It owns the notifier (and through it the
//! connection registry) and, optionally, the ephemeral state store.

use std::sync::Arc;

use courier_hub::{Notifier, Registry};
use courier_store::StateStore;

use crate::error::GatewayError;

/// Shared state for the Axum application.
#[derive(Clone)]
pub struct AppState {
    /// Fan-out notifier over the connection registry.
    pub notifier: Notifier,
    /// Cart and session store, absent when no `REDIS_URL` is configured.
    pub store: Option<StateStore>,
}

impl AppState {
    /// Create state around `notifier` with no state store.
    pub const fn new(notifier: Notifier) -> Self {
        Self {
            notifier,
            store: None,
        }
    }

    /// Attach the ephemeral state store.
    #[must_use]
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    /// The connection registry.
    pub const fn registry(&self) -> &Arc<Registry> {
        self.notifier.registry()
    }

    /// The state store, or [`GatewayError::StoreUnavailable`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StoreUnavailable`] when no store is attached.
    pub const fn store(&self) -> Result<&StateStore, GatewayError> {
        match &self.store {
            Some(store) => Ok(store),
            None => Err(GatewayError::StoreUnavailable),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Notifier::new(Arc::new(Registry::new())))
    }
}
