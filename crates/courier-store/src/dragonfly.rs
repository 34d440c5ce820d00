//! `Dragonfly` (Redis-compatible) ephemeral state.
//!
//! # Key Patterns
//!
//! | Pattern | Type | TTL | Description |
//! |---------|------|-----|-------------|
//! | `cart:{user_id}` | JSON array | 24 h | Cart line items |
//! | `user:{phone_number}` | JSON object | 1 h | Conversational session (`{"state", "data"}`) |
//!
//! Every write resets the key's expiry. Reads never extend it.

use std::time::Duration;

use fred::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::model::{CartItem, SessionState, merge_item};

/// Default lifetime of a cart.
pub const DEFAULT_CART_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default lifetime of a conversational session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Key holding a user's cart.
pub fn cart_key(user_id: i64) -> String {
    format!("cart:{user_id}")
}

/// Key holding the session of the user reached at `phone_number`.
pub fn session_key(phone_number: &str) -> String {
    format!("user:{phone_number}")
}

/// Expiry applied to each kind of value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTtl {
    /// Lifetime of `cart:*` keys.
    pub cart: Duration,
    /// Lifetime of `user:*` keys.
    pub session: Duration,
}

impl Default for StoreTtl {
    fn default() -> Self {
        Self {
            cart: DEFAULT_CART_TTL,
            session: DEFAULT_SESSION_TTL,
        }
    }
}

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Wraps a [`fred::prelude::Client`] and provides typed operations for the
/// cart and session key patterns.
#[derive(Clone)]
pub struct StateStore {
    client: Client,
    ttl: StoreTtl,
}

impl StateStore {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str, ttl: StoreTtl) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!(
            cart_ttl_secs = ttl.cart.as_secs(),
            session_ttl_secs = ttl.session.as_secs(),
            "Connected to Dragonfly"
        );
        Ok(Self { client, ttl })
    }

    /// The expiry configuration in use.
    pub const fn ttl(&self) -> StoreTtl {
        self.ttl
    }

    // =========================================================================
    // Generic JSON get/set/delete
    // =========================================================================

    /// Serialize `value` as JSON and store it at `key`, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if serialization fails.
    /// Returns [`StoreError::Config`] if `ttl` does not fit the protocol.
    /// Returns [`StoreError::Dragonfly`] if the write fails.
    pub async fn set_json_ex<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        let seconds = i64::try_from(ttl.as_secs())
            .map_err(|e| StoreError::Config(format!("TTL out of range for {key}: {e}")))?;
        let _: () = self
            .client
            .set(key, json.as_str(), Some(Expiration::EX(seconds)), None, false)
            .await?;
        Ok(())
    }

    /// Read the value at `key` and deserialize from JSON.
    ///
    /// Returns `None` if the key does not exist or has expired.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if deserialization fails.
    /// Returns [`StoreError::Dragonfly`] if the read fails.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let value: Option<String> = self.client.get(key).await?;
        value
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Delete a key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _: u32 = self.client.del(key).await?;
        Ok(())
    }

    // =========================================================================
    // Carts -- cart:{user_id}
    // =========================================================================

    /// Get a user's cart. A missing or expired cart is empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read or deserialization fails.
    pub async fn get_cart(&self, user_id: i64) -> Result<Vec<CartItem>, StoreError> {
        Ok(self
            .get_json(&cart_key(user_id))
            .await?
            .unwrap_or_default())
    }

    /// Replace a user's cart, resetting its expiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or the write fails.
    pub async fn set_cart(&self, user_id: i64, items: &[CartItem]) -> Result<(), StoreError> {
        self.set_json_ex(&cart_key(user_id), &items, self.ttl.cart)
            .await
    }

    /// Add `item` to a user's cart and return the updated cart.
    ///
    /// The cart is read, merged, and written back whole. Two concurrent adds
    /// for the same user may lose one of the updates.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read or the write fails.
    pub async fn add_to_cart(&self, user_id: i64, item: CartItem) -> Result<Vec<CartItem>, StoreError> {
        let mut cart = self.get_cart(user_id).await?;
        merge_item(&mut cart, item);
        self.set_cart(user_id, &cart).await?;
        Ok(cart)
    }

    /// Remove a user's cart.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the delete fails.
    pub async fn clear_cart(&self, user_id: i64) -> Result<(), StoreError> {
        self.delete(&cart_key(user_id)).await
    }

    // =========================================================================
    // Sessions -- user:{phone_number}
    // =========================================================================

    /// Get the conversational session for `phone_number`, if one is live.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read or deserialization fails.
    pub async fn get_session(&self, phone_number: &str) -> Result<Option<SessionState>, StoreError> {
        self.get_json(&session_key(phone_number)).await
    }

    /// Replace the session for `phone_number`, resetting its expiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or the write fails.
    pub async fn set_session(&self, phone_number: &str, session: &SessionState) -> Result<(), StoreError> {
        self.set_json_ex(&session_key(phone_number), session, self.ttl.session)
            .await
    }

    /// Remove the session for `phone_number`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the delete fails.
    pub async fn clear_session(&self, phone_number: &str) -> Result<(), StoreError> {
        self.delete(&session_key(phone_number)).await
    }

    /// Remaining lifetime of `key` in seconds.
    ///
    /// Follows the `TTL` command: `-2` for a missing key, `-1` for a key
    /// without expiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the read fails.
    pub async fn ttl_of(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.client.ttl(key).await?)
    }

    /// Return a reference to the underlying [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }
}
