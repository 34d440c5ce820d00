//! Classification of inbound client frames.
//!
//! Clients may send anything on their channel. Only the keep-alive probe
//! `{"type":"ping"}` is acted on; every other frame, including frames that
//! are not JSON at all, is ignored and the connection stays open.

use serde_json::Value;

/// What the receive loop should do with one inbound text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundFrame {
    /// A keep-alive probe that must be answered with a single `pong`.
    Ping,
    /// Anything else.
    Ignored,
}

impl InboundFrame {
    /// Classify a text frame.
    ///
    /// Only a JSON object whose `type` field is the string `"ping"` counts.
    pub fn classify(text: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return Self::Ignored;
        };
        // `get` on anything but an object is `None`.
        if value.get("type").and_then(Value::as_str) == Some("ping") {
            Self::Ping
        } else {
            Self::Ignored
        }
    }
}
