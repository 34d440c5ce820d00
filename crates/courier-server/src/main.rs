//! Entry point for the courier notification gateway.
//!
//! The gateway keeps live `WebSocket` connections for three audiences
//! (drivers, restaurant dashboards, order trackers) and pushes events to
//! them when the order service calls its `/api/notify` endpoints. Carts and
//! conversational sessions live in `Dragonfly` when `REDIS_URL` is set.
//!
//! # Architecture
//!
//! ```text
//! order service --> /api/notify --> Notifier --> Registry --> WebSocket peers
//! ```

mod config;
mod error;

use std::sync::Arc;

use anyhow::Context;
use courier_gateway::AppState;
use courier_hub::{Notifier, Registry};
use courier_store::StateStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{GatewayConfig, LogFormat};
use crate::error::ServerError;

/// Application entry point.
///
/// Loads configuration from environment variables, initializes logging,
/// connects the optional state store, then serves HTTP and `WebSocket`
/// traffic until Ctrl+C.
///
/// # Errors
///
/// Returns an error if configuration, the store connection, or the server
/// fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("loading configuration")?;
    init_tracing(config.log_format);

    info!("courier-server starting");
    info!(
        host = config.server.host,
        port = config.server.port,
        send_timeout_ms = config.send_timeout.as_millis(),
        store = config.redis_url.is_some(),
        "configuration loaded"
    );

    let notifier =
        Notifier::new(Arc::new(Registry::new())).with_send_timeout(config.send_timeout);
    let mut state = AppState::new(notifier);

    match &config.redis_url {
        Some(url) => {
            let store = StateStore::connect(url, config.ttl)
                .await
                .map_err(ServerError::from)
                .context("connecting to Dragonfly")?;
            state = state.with_store(store);
        }
        None => warn!("REDIS_URL not set, cart endpoints disabled"),
    }

    courier_gateway::start_server(&config.server, Arc::new(state))
        .await
        .map_err(ServerError::from)?;

    info!("courier-server stopped");
    Ok(())
}

/// Install the global tracing subscriber.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
