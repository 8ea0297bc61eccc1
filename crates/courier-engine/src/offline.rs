// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-recipient FIFO of messages waiting for the recipient to connect.

use std::collections::{BTreeMap, HashMap, VecDeque};

use courier_core::{Identity, Message};

/// Messages buffered for offline recipients.
///
/// An entry exists only while it holds at least one message.
#[derive(Debug, Default)]
pub struct OfflineQueue {
    pending: HashMap<Identity, VecDeque<Message>>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, message: Message) {
        self.pending
            .entry(message.to.clone())
            .or_default()
            .push_back(message);
    }

    /// Remove and return everything queued for `recipient`, oldest first.
    pub fn take(&mut self, recipient: &Identity) -> Option<VecDeque<Message>> {
        self.pending.remove(recipient)
    }

    /// Put back messages that could not be handed over, ahead of anything
    /// queued since they were taken.
    pub fn restore(&mut self, recipient: &Identity, mut undelivered: VecDeque<Message>) {
        if undelivered.is_empty() {
            return;
        }
        if let Some(newer) = self.pending.remove(recipient) {
            undelivered.extend(newer);
        }
        self.pending.insert(recipient.clone(), undelivered);
    }

    pub fn depth(&self, recipient: &Identity) -> usize {
        self.pending.get(recipient).map_or(0, VecDeque::len)
    }

    /// Queue depth per pending recipient.
    pub fn depths(&self) -> BTreeMap<Identity, usize> {
        self.pending
            .iter()
            .map(|(identity, queue)| (identity.clone(), queue.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courier_core::MessageId;

    fn msg(id: &str, to: &str) -> Message {
        Message {
            id: MessageId(id.into()),
            from: "sender".into(),
            to: to.into(),
            content: "x".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn take_is_fifo_and_removes_entry() {
        let mut queue = OfflineQueue::new();
        queue.enqueue(msg("1", "bob"));
        queue.enqueue(msg("2", "bob"));
        assert_eq!(queue.depth(&"bob".into()), 2);

        let taken: Vec<String> = queue
            .take(&"bob".into())
            .unwrap()
            .into_iter()
            .map(|m| m.id.0)
            .collect();
        assert_eq!(taken, vec!["1", "2"]);
        assert!(queue.take(&"bob".into()).is_none());
        assert!(queue.depths().is_empty());
    }

    #[test]
    fn restore_keeps_older_messages_first() {
        let mut queue = OfflineQueue::new();
        queue.enqueue(msg("1", "bob"));
        let taken = queue.take(&"bob".into()).unwrap();
        queue.enqueue(msg("2", "bob"));

        queue.restore(&"bob".into(), taken);
        let order: Vec<String> = queue
            .take(&"bob".into())
            .unwrap()
            .into_iter()
            .map(|m| m.id.0)
            .collect();
        assert_eq!(order, vec!["1", "2"]);
    }

    #[test]
    fn restoring_nothing_leaves_no_entry() {
        let mut queue = OfflineQueue::new();
        queue.restore(&"bob".into(), VecDeque::new());
        assert_eq!(queue.depth(&"bob".into()), 0);
        assert!(queue.depths().is_empty());
    }

    #[test]
    fn depths_per_recipient() {
        let mut queue = OfflineQueue::new();
        queue.enqueue(msg("1", "bob"));
        queue.enqueue(msg("2", "carol"));
        queue.enqueue(msg("3", "carol"));
        let depths = queue.depths();
        assert_eq!(depths.get(&Identity::from("bob")), Some(&1));
        assert_eq!(depths.get(&Identity::from("carol")), Some(&2));
    }
}
