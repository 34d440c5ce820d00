//! Values kept in the ephemeral state store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line of a shopping cart.
///
/// Only the fields the cart logic reads are typed; anything else the
/// ordering client attaches (notes, modifiers) is carried through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Menu item primary key.
    pub menu_item_id: i64,
    /// Display name at the time the item was added.
    pub name: String,
    /// Unit price as charged when the item was added.
    pub price: f64,
    /// Number of units.
    pub quantity: u32,
    /// Additional client-supplied fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Conversational state for a user reached by phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Name of the current conversation step.
    pub state: String,
    /// Data collected so far in the conversation.
    pub data: Value,
}

impl SessionState {
    /// A session at `state` with no collected data.
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            data: Value::Object(serde_json::Map::new()),
        }
    }
}

/// Merge `item` into `cart`.
///
/// A line for the same menu item has its quantity increased; otherwise the
/// item is appended.
pub fn merge_item(cart: &mut Vec<CartItem>, item: CartItem) {
    match cart.iter_mut().find(|line| line.menu_item_id == item.menu_item_id) {
        Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
        None => cart.push(item),
    }
}
