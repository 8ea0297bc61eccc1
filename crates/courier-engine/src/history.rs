// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only conversation history, keyed by the unordered identity pair.

use std::collections::HashMap;

use courier_core::{ConversationKey, Identity, Message};
use serde::Serialize;

/// Every message ever accepted, grouped by conversation.
///
/// Entries are never removed or rewritten for the process lifetime.
#[derive(Debug, Default)]
pub struct HistoryStore {
    conversations: HashMap<ConversationKey, Vec<Message>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.conversations
            .entry(message.conversation_key())
            .or_default()
            .push(message);
    }

    /// Messages exchanged between `a` and `b`, oldest first.
    ///
    /// Unknown pairs yield an empty conversation rather than an error.
    pub fn conversation(&self, a: &Identity, b: &Identity) -> Conversation {
        let key = ConversationKey::new(a, b);
        let mut messages = self.conversations.get(&key).cloned().unwrap_or_default();
        // Stable: equal timestamps keep insertion order.
        messages.sort_by_key(|m| m.timestamp);
        Conversation {
            chat_key: key,
            messages,
        }
    }

    /// Number of distinct conversations with at least one message.
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }
}

/// Response shape of a history query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub chat_key: ConversationKey,
    pub messages: Vec<Message>,
}
