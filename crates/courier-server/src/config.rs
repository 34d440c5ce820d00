//! Configuration for the gateway binary.
//!
//! All configuration is loaded from environment variables. Only the store
//! URL is optional in the sense that leaving it unset disables the cart
//! endpoints; everything else has a default.

use std::time::Duration;

use courier_gateway::ServerConfig;
use courier_hub::DEFAULT_SEND_TIMEOUT;
use courier_store::StoreTtl;

use crate::error::ServerError;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Complete gateway configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listener address.
    pub server: ServerConfig,
    /// Deadline for a single push write before the connection is evicted.
    pub send_timeout: Duration,
    /// `Dragonfly`/Redis URL for carts and sessions, if any.
    pub redis_url: Option<String>,
    /// Expiry of cart and session keys.
    pub ttl: StoreTtl,
    /// Log output format.
    pub log_format: LogFormat,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional variables:
    /// - `COURIER_HOST` -- bind address (default `0.0.0.0`)
    /// - `COURIER_PORT` -- listen port (default `8000`)
    /// - `COURIER_SEND_TIMEOUT_MS` -- per-write push deadline (default `2000`)
    /// - `REDIS_URL` -- state store URL (cart endpoints disabled when unset)
    /// - `CART_TTL_SECS` -- cart expiry (default `86400`)
    /// - `SESSION_TTL_SECS` -- session expiry (default `3600`)
    /// - `LOG_FORMAT` -- `text` or `json` (default `text`)
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();
        let ttl_defaults = StoreTtl::default();

        let host = lookup("COURIER_HOST").unwrap_or(defaults.host);
        let port: u16 = parse_or(&lookup, "COURIER_PORT", defaults.port)?;

        let default_timeout_ms = u64::try_from(DEFAULT_SEND_TIMEOUT.as_millis()).unwrap_or(2000);
        let send_timeout_ms: u64 = parse_or(&lookup, "COURIER_SEND_TIMEOUT_MS", default_timeout_ms)?;
        if send_timeout_ms == 0 {
            return Err(ServerError::Config(String::from(
                "COURIER_SEND_TIMEOUT_MS must be greater than zero",
            )));
        }

        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());

        let cart_secs: u64 = parse_or(&lookup, "CART_TTL_SECS", ttl_defaults.cart.as_secs())?;
        let session_secs: u64 =
            parse_or(&lookup, "SESSION_TTL_SECS", ttl_defaults.session.as_secs())?;
        // `SET .. EX 0` is rejected by the store.
        for (name, secs) in [("CART_TTL_SECS", cart_secs), ("SESSION_TTL_SECS", session_secs)] {
            if secs == 0 {
                return Err(ServerError::Config(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ServerError::Config(format!("unknown LOG_FORMAT: {other}")));
            }
        };

        Ok(Self {
            server: ServerConfig { host, port },
            send_timeout: Duration::from_millis(send_timeout_ms),
            redis_url,
            ttl: StoreTtl {
                cart: Duration::from_secs(cart_secs),
                session: Duration::from_secs(session_secs),
            },
            log_format,
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ServerError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid {name}: {e}")))
    })
}
