//! Real-time gateway for the Courier order-delivery platform.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoints** for the three audiences: drivers
//!   (`/ws/driver/{id}`), restaurant dashboards (`/ws/restaurant/{id}`),
//!   and order tracking pages (`/ws/order/{id}`)
//! - **Producer REST endpoints** (`/api/notify/...`) through which the
//!   order service triggers fan-out
//! - **Cart REST endpoints** (`/api/cart/{user_id}`) backed by the
//!   ephemeral state store, when one is configured
//! - **Health and connection stats** (`/health`, `/api/connections`)
//!
//! # Architecture
//!
//! Every accepted socket runs on its own task: it registers its write half
//! with the [`Registry`](courier_hub::Registry), answers `ping` frames,
//! and unregisters when the peer goes away. Fan-out runs inline on the
//! request that triggered it, through the shared
//! [`Notifier`](courier_hub::Notifier) held in [`AppState`].

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::GatewayError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, serve, spawn_gateway, start_server};
pub use state::AppState;
