// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Spawns the message engine, binds the gateway, and runs until SIGINT or
//! SIGTERM.

use std::time::Duration;

use courier_config::model::CourierConfig;
use courier_core::CourierError;
use courier_engine::{spawn_engine, EngineConfig};
use courier_gateway::{bind, router, serve, GatewayState, ServerConfig};
use tracing::{error, info, warn};

use crate::shutdown;

/// How long the engine gets to finish queued commands after the gateway stops.
const ENGINE_DRAIN: Duration = Duration::from_secs(5);

/// Runs the `courier serve` command.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.log.level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting courier");

    let shutdown = shutdown::install_signal_handler();

    let (engine, engine_task) = spawn_engine(engine_config(&config));
    let server_config = server_config(&config);
    let listener = bind(&server_config).await?;
    let app = router(
        GatewayState::new(engine, shutdown.clone()),
        server_config.cors_permissive,
    );

    serve(listener, app, shutdown).await?;

    match tokio::time::timeout(ENGINE_DRAIN, engine_task).await {
        Ok(Ok(())) => info!("message engine stopped"),
        Ok(Err(e)) => error!(error = %e, "message engine task failed"),
        Err(_) => warn!("message engine still running at shutdown"),
    }

    info!("courier stopped");
    Ok(())
}

fn engine_config(config: &CourierConfig) -> EngineConfig {
    EngineConfig {
        mailbox_capacity: config.engine.mailbox_capacity,
        max_content_bytes: config.engine.max_content_bytes,
        max_pending_frames: config.engine.max_pending_frames,
    }
}

fn server_config(config: &CourierConfig) -> ServerConfig {
    ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
        cors_permissive: config.gateway.cors_permissive,
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the config level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
