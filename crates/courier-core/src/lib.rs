// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier messaging gateway.
//!
//! This crate provides the identity and message types, the JSON wire frames,
//! and the error type shared by the engine, the gateway, and the binary.

pub mod error;
pub mod frames;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use frames::{ChatRequest, ControlFrame, ServerFrame};
pub use types::{ConnectionId, ConversationKey, Identity, Message, MessageId};
