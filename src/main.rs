//! # Real-time Notification Server
//!
//! Accepts WebSocket sessions, fans broadcast events out to all of them,
//! and gates state-changing requests behind authentication and per-address
//! rate limiting.
//!
//! ## Features
//! - Single-control-loop session hub with slow-consumer eviction
//! - Bearer-token authentication with a closed role set
//! - Fixed-window admission limiting with `X-RateLimit-*` headers
//! - Panic recovery at the request boundary
//! - Environment-based configuration loading

use std::net::SocketAddr;
use std::sync::Arc;

use notify_hub::config::AppConfig;
use notify_hub::server::{self, Hub};
use tokio::signal;
use tracing::info;

/// Entry point for the notification server.
///
/// Initializes logging, loads configuration from the environment, spawns
/// the hub control loop, and serves the HTTP/WebSocket listener until a
/// shutdown signal arrives.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    config.validate()?;

    let (hub, hub_handle) = Hub::new();
    tokio::spawn(hub.run());

    let state = server::AppState::new(Arc::new(config), hub_handle);
    let app = server::router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    info!(%addr, "server listening");

    axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Blocks until Ctrl+C, then lets the listener drain and exit.
async fn shutdown_signal() {
    signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    info!("Shutting down gracefully");
}
