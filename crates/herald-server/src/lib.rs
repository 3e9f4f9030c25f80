//! # herald-server
//!
//! Server-push (SSE) connection manager and its Axum HTTP boundary.
//!
//! - Push engine: connection registry, dispatcher, heartbeat, notifications
//! - HTTP endpoints: stream accept, event send, example webhook, health, metrics
//! - Prometheus metrics via the `metrics` facade
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod push;
pub mod routes;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use server::HeraldServer;
