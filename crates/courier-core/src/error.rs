// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier messaging gateway.

use thiserror::Error;

/// The primary error type used across the engine, gateway, and binary.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, bad values, unreadable files).
    #[error("configuration error: {0}")]
    Config(String),

    /// Wire protocol violations (malformed frames, missing handshake identity).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A request was well-formed but semantically invalid (empty recipient, oversized content).
    #[error("validation error: {0}")]
    Validation(String),

    /// A frame could not be handed to a connection (handle closed).
    #[error("delivery to `{identity}` failed: {message}")]
    Delivery { identity: String, message: String },

    /// The message engine is no longer accepting commands.
    #[error("message engine unavailable")]
    EngineUnavailable,

    /// I/O failures (bind, serve, HTTP client).
    #[error("i/o error: {message}")]
    Io {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Build an [`CourierError::Io`] from any error, keeping it as the source.
    pub fn io<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CourierError::Io {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_error_names_identity() {
        let err = CourierError::Delivery {
            identity: "bob".into(),
            message: "connection closed".into(),
        };
        assert_eq!(err.to_string(), "delivery to `bob` failed: connection closed");
    }

    #[test]
    fn io_helper_keeps_source() {
        let err = CourierError::io("bind failed", std::io::Error::other("port in use"));
        match err {
            CourierError::Io { message, source } => {
                assert_eq!(message, "bind failed");
                assert!(source.unwrap().to_string().contains("port in use"));
            }
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
