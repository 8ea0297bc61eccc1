// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON wire frames exchanged over the WebSocket connection.
//!
//! Client -> Server:
//! ```json
//! {"type": "chat", "to": "bob", "content": "hello"}
//! ```
//!
//! Server -> Client:
//! ```json
//! {"id": "msg-1", "from": "alice", "to": "bob", "content": "hello", "timestamp": "..."}
//! {"type": "ack", "ack": "msg-1"}
//! {"type": "nack", "reason": "content must not be empty"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CourierError;
use crate::types::{Identity, Message, MessageId};

/// Raw inbound frame as it appears on the wire.
///
/// Fields are optional so that a frame with the right `type` but missing
/// fields is reported as a validation problem rather than a JSON error.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Chat {
        #[serde(default)]
        to: Option<String>,
        #[serde(default)]
        content: Option<String>,
    },
}

/// A validated chat request from a connected client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub to: Identity,
    pub content: String,
}

impl ChatRequest {
    /// Parse and validate a text frame.
    ///
    /// Rejects invalid JSON, any `type` other than `"chat"`, and missing or
    /// empty `to` / `content` fields.
    pub fn parse(text: &str) -> Result<Self, CourierError> {
        let frame: ClientFrame = serde_json::from_str(text)
            .map_err(|e| CourierError::Protocol(format!("invalid frame: {e}")))?;

        let ClientFrame::Chat { to, content } = frame;
        let to = to
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CourierError::Protocol("chat frame requires a non-empty `to`".into()))?;
        let content = content.filter(|c| !c.is_empty()).ok_or_else(|| {
            CourierError::Protocol("chat frame requires a non-empty `content`".into())
        })?;

        Ok(Self {
            to: Identity(to),
            content,
        })
    }
}

/// Control frames sent to the author of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// The message was accepted and recorded in history.
    Ack { ack: MessageId },
    /// The message was not accepted.
    Nack { reason: String },
}

/// Any frame the gateway writes to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Message(Message),
    Control(ControlFrame),
}

impl ServerFrame {
    pub fn ack(id: MessageId) -> Self {
        ServerFrame::Control(ControlFrame::Ack { ack: id })
    }

    pub fn nack(reason: impl Into<String>) -> Self {
        ServerFrame::Control(ControlFrame::Nack {
            reason: reason.into(),
        })
    }

    pub fn to_json(&self) -> Result<String, CourierError> {
        serde_json::to_string(self)
            .map_err(|e| CourierError::Internal(format!("failed to encode frame: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_frame() {
        let req = ChatRequest::parse(r#"{"type":"chat","to":"B","content":"hi"}"#).unwrap();
        assert_eq!(req.to.as_str(), "B");
        assert_eq!(req.content, "hi");
    }

    #[test]
    fn extra_fields_are_ignored() {
        let req =
            ChatRequest::parse(r#"{"type":"chat","to":"B","content":"hi","client_ts":1}"#).unwrap();
        assert_eq!(req.content, "hi");
    }

    #[test]
    fn rejects_invalid_json() {
        let err = ChatRequest::parse("{not json").unwrap_err();
        assert!(matches!(err, CourierError::Protocol(_)));
    }

    #[test]
    fn rejects_wrong_type() {
        assert!(ChatRequest::parse(r#"{"type":"typing","to":"B"}"#).is_err());
        assert!(ChatRequest::parse(r#"{"to":"B","content":"hi"}"#).is_err());
    }

    #[test]
    fn rejects_missing_or_empty_fields() {
        assert!(ChatRequest::parse(r#"{"type":"chat","content":"hi"}"#).is_err());
        assert!(ChatRequest::parse(r#"{"type":"chat","to":"","content":"hi"}"#).is_err());
        assert!(ChatRequest::parse(r#"{"type":"chat","to":"B"}"#).is_err());
        assert!(ChatRequest::parse(r#"{"type":"chat","to":"B","content":""}"#).is_err());
    }

    #[test]
    fn ack_frame_wire_shape() {
        let json = ServerFrame::ack(MessageId("msg-7".into())).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, serde_json::json!({"type": "ack", "ack": "msg-7"}));
    }

    #[test]
    fn nack_frame_wire_shape() {
        let json = ServerFrame::nack("too large").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, serde_json::json!({"type": "nack", "reason": "too large"}));
    }

    #[test]
    fn client_side_decodes_both_shapes() {
        let msg: ServerFrame = serde_json::from_str(
            r#"{"id":"msg-1","from":"A","to":"B","content":"hi","timestamp":"2026-10-19T08:00:00Z"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ServerFrame::Message(_)));

        let ack: ServerFrame = serde_json::from_str(r#"{"type":"ack","ack":"msg-1"}"#).unwrap();
        assert_eq!(ack, ServerFrame::ack(MessageId("msg-1".into())));
    }
}
