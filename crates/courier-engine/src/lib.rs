// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message routing and delivery engine for the Courier gateway.
//!
//! The engine keeps three stores:
//! - the [`ConnectionRegistry`] of live connections,
//! - the append-only [`HistoryStore`] of every accepted message,
//! - the [`OfflineQueue`] of messages waiting for their recipient,
//!
//! and a single processor task that is their only writer. All submissions,
//! flushes, connects and disconnects go through that task's mailbox, so
//! per-recipient history order, delivery order and queue order always agree.

pub mod clock;
pub mod connection;
pub mod handle;
pub mod history;
pub mod offline;
pub mod processor;
pub mod registry;

pub use connection::{
    BACKLOG_EXCEEDED_REASON, CLOSE_POLICY_VIOLATION, ConnectionHandle, DEFAULT_MAX_PENDING_FRAMES,
    Outbound, OutboundReceiver, OverloadSignal,
};
pub use handle::{spawn_engine, EngineHandle};
pub use history::{Conversation, HistoryStore};
pub use offline::OfflineQueue;
pub use processor::{
    ConnectReport, EngineConfig, FAULT_REASON, MessageProcessor, StatusSnapshot, SubmitOutcome,
};
pub use registry::ConnectionRegistry;
