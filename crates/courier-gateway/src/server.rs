// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::time::Instant;

use axum::{routing::get, Router};
use courier_core::CourierError;
use courier_engine::EngineHandle;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Debug, Clone)]
pub struct GatewayState {
    /// Client for the message engine task.
    pub engine: EngineHandle,
    /// Cancelled when the process is shutting down; open sockets close on it.
    pub shutdown: CancellationToken,
    /// Process start time for uptime reporting.
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(engine: EngineHandle, shutdown: CancellationToken) -> Self {
        Self {
            engine,
            shutdown,
            started_at: Instant::now(),
        }
    }
}

/// Gateway server configuration (mirrors `GatewayConfig` from courier-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Answer CORS preflights for any origin.
    pub cors_permissive: bool,
}

/// Build the gateway router.
///
/// Routes:
/// - GET / and GET /ws (WebSocket upgrade, identity via `?userId=`)
/// - GET /api/messages?user1=..&user2=..
/// - GET /api/status
/// - GET /health
pub fn router(state: GatewayState, cors_permissive: bool) -> Router {
    let app = Router::new()
        .route("/", get(ws::ws_handler))
        .route("/ws", get(ws::ws_handler))
        .route("/api/messages", get(handlers::get_messages))
        .route("/api/status", get(handlers::get_status))
        .route("/health", get(handlers::get_health))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Bind the listener for `config`. Port `0` picks a free port.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, CourierError> {
    let addr = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::io(format!("failed to bind gateway to {addr}"), e))
}

/// Serve `app` on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), CourierError> {
    let addr = listener
        .local_addr()
        .map_err(|e| CourierError::io("failed to read gateway address", e))?;
    tracing::info!(%addr, "gateway server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| CourierError::io("gateway server error", e))?;

    tracing::info!("gateway server stopped");
    Ok(())
}
