// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket front end for the Courier message engine.
//!
//! Connections are identified at upgrade time and handed to the engine;
//! the REST endpoints are read-only views of history and engine status.

pub mod handlers;
pub mod server;
pub mod ws;

pub use server::{bind, router, serve, GatewayState, ServerConfig};
