// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message processor: the only writer of history and the offline queue.
//!
//! A single task owns a [`MessageProcessor`] and applies [`Command`]s from
//! its mailbox one at a time. Each command runs to completion before the
//! next one starts, which is the process-wide exclusion section for message
//! submission, offline flushes, and connect/disconnect bookkeeping.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use courier_core::{
    ConnectionId, CourierError, Identity, Message, MessageId, ServerFrame,
};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::clock::MessageClock;
use crate::connection::{CLOSE_POLICY_VIOLATION, ConnectionHandle, DEFAULT_MAX_PENDING_FRAMES};
use crate::history::{Conversation, HistoryStore};
use crate::offline::OfflineQueue;
use crate::registry::ConnectionRegistry;

/// Close reason sent to a connection replaced by a reconnect.
pub const SUPERSEDED_REASON: &str = "superseded by a newer connection";

/// Nack reason when a submission hit an unexpected fault.
pub const FAULT_REASON: &str = "internal error while processing message";

/// Tunables for the processor and its mailbox.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bounded mailbox size; callers wait when it is full.
    pub mailbox_capacity: usize,
    /// Largest accepted message content, in bytes.
    pub max_content_bytes: usize,
    /// Frames a connection's writer may fall behind before it is dropped.
    pub max_pending_frames: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
            max_content_bytes: 64 * 1024,
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
        }
    }
}

/// Result of a submission, as seen by the submitting connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Recorded and handed to the recipient's open connection.
    Delivered(MessageId),
    /// Recorded and buffered until the recipient connects.
    Queued(MessageId),
    /// Not recorded. The sender was sent a nack.
    Rejected(String),
    /// Not recorded. The submitting connection is no longer the registered
    /// one for its identity, so it gets neither an ack nor a nack.
    Superseded,
}

impl SubmitOutcome {
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            SubmitOutcome::Delivered(id) | SubmitOutcome::Queued(id) => Some(id),
            SubmitOutcome::Rejected(_) | SubmitOutcome::Superseded => None,
        }
    }
}

/// What happened when a connection was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReport {
    /// Buffered messages handed to the new connection.
    pub flushed: usize,
    /// The connection this one replaced, if any. It has been asked to close.
    pub superseded: Option<ConnectionId>,
}

/// Best-effort diagnostic view of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub active_users: Vec<Identity>,
    pub queued_messages: BTreeMap<Identity, usize>,
    pub total_chats: usize,
}

/// Mailbox messages understood by the processor task.
#[derive(Debug)]
pub enum Command {
    Connect {
        identity: Identity,
        handle: ConnectionHandle,
        reply: oneshot::Sender<ConnectReport>,
    },
    Disconnect {
        identity: Identity,
        connection: ConnectionId,
        reply: oneshot::Sender<bool>,
    },
    Submit {
        from: Identity,
        connection: ConnectionId,
        to: Identity,
        content: String,
        reply: oneshot::Sender<SubmitOutcome>,
    },
    History {
        a: Identity,
        b: Identity,
        reply: oneshot::Sender<Conversation>,
    },
    Snapshot {
        reply: oneshot::Sender<StatusSnapshot>,
    },
}

/// State owned by the processor task.
#[derive(Debug)]
pub struct MessageProcessor {
    registry: Arc<ConnectionRegistry>,
    history: HistoryStore,
    offline: OfflineQueue,
    clock: MessageClock,
    max_content_bytes: usize,
    #[cfg(test)]
    poison_content: Option<String>,
}

impl MessageProcessor {
    pub fn new(registry: Arc<ConnectionRegistry>, config: &EngineConfig) -> Self {
        Self {
            registry,
            history: HistoryStore::new(),
            offline: OfflineQueue::new(),
            clock: MessageClock::new(),
            max_content_bytes: config.max_content_bytes,
            #[cfg(test)]
            poison_content: None,
        }
    }

    /// Drain the mailbox until every sender is dropped.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        debug!("message processor started");
        while let Some(command) = commands.recv().await {
            self.dispatch(command);
        }
        debug!("message processor stopped");
    }

    /// Apply one command.
    ///
    /// A fault inside a command is logged and the processor moves on to the
    /// next one. A faulted submission is nacked; any other faulted command
    /// drops its reply, which its caller sees as an engine error.
    fn dispatch(&mut self, command: Command) {
        // Reply failures mean the caller went away; the work is already done.
        match command {
            Command::Connect {
                identity,
                handle,
                reply,
            } => {
                if let Some(report) = self.guarded("connect", |p| p.connect(identity, handle)) {
                    let _ = reply.send(report);
                }
            }
            Command::Disconnect {
                identity,
                connection,
                reply,
            } => {
                if let Some(removed) = self.guarded("disconnect", |p| p.disconnect(&identity, connection)) {
                    let _ = reply.send(removed);
                }
            }
            Command::Submit {
                from,
                connection,
                to,
                content,
                reply,
            } => {
                let outcome = self
                    .guarded("submit", |p| p.submit(&from, connection, to, content))
                    .unwrap_or_else(|| {
                        self.notify(&from, ServerFrame::nack(FAULT_REASON));
                        SubmitOutcome::Rejected(FAULT_REASON.to_string())
                    });
                let _ = reply.send(outcome);
            }
            Command::History { a, b, reply } => {
                if let Some(conversation) = self.guarded("history", |p| p.history(&a, &b)) {
                    let _ = reply.send(conversation);
                }
            }
            Command::Snapshot { reply } => {
                if let Some(snapshot) = self.guarded("snapshot", |p| p.snapshot()) {
                    let _ = reply.send(snapshot);
                }
            }
        }
    }

    fn guarded<T>(&mut self, command: &'static str, work: impl FnOnce(&mut Self) -> T) -> Option<T> {
        match panic::catch_unwind(AssertUnwindSafe(|| work(self))) {
            Ok(value) => Some(value),
            Err(fault) => {
                error!(command, fault = %fault_message(fault.as_ref()), "command faulted");
                None
            }
        }
    }

    /// Register a connection, close the one it replaces, and flush its queue.
    pub fn connect(&mut self, identity: Identity, handle: ConnectionHandle) -> ConnectReport {
        let connection = handle.id();
        let superseded = self
            .registry
            .register(identity.clone(), handle.clone())
            .map(|old| {
                if old.close(CLOSE_POLICY_VIOLATION, SUPERSEDED_REASON).is_err() {
                    debug!(identity = %identity, connection = %old.id(), "superseded connection already closed");
                }
                info!(identity = %identity, old = %old.id(), new = %connection, "connection superseded");
                old.id()
            });

        let flushed = self.flush(&identity, &handle);
        info!(identity = %identity, connection = %connection, flushed, "connected");
        ConnectReport {
            flushed,
            superseded,
        }
    }

    /// Remove `identity` from the registry if `connection` is still the current one.
    pub fn disconnect(&mut self, identity: &Identity, connection: ConnectionId) -> bool {
        let removed = self.registry.unregister(identity, connection);
        if removed {
            info!(identity = %identity, connection = %connection, "disconnected");
        } else {
            debug!(identity = %identity, connection = %connection, "stale disconnect ignored");
        }
        removed
    }

    /// Record a message, deliver or buffer it, and acknowledge the sender.
    ///
    /// `connection` must be the one currently registered for `from`. A
    /// submission from a superseded connection is dropped without a reply
    /// frame, so its ack cannot reach the newer connection.
    pub fn submit(
        &mut self,
        from: &Identity,
        connection: ConnectionId,
        to: Identity,
        content: String,
    ) -> SubmitOutcome {
        if !self.registry.is_current(from, connection) {
            debug!(from = %from, connection = %connection, "submission from superseded connection dropped");
            return SubmitOutcome::Superseded;
        }
        match self.record_and_route(from, to, content) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(from = %from, error = %e, "message rejected");
                let reason = e.to_string();
                self.notify(from, ServerFrame::nack(reason.clone()));
                SubmitOutcome::Rejected(reason)
            }
        }
    }

    fn record_and_route(
        &mut self,
        from: &Identity,
        to: Identity,
        content: String,
    ) -> Result<SubmitOutcome, CourierError> {
        if from.is_empty() {
            return Err(CourierError::Validation("sender identity must not be empty".into()));
        }
        if to.is_empty() {
            return Err(CourierError::Validation("recipient must not be empty".into()));
        }
        if content.is_empty() {
            return Err(CourierError::Validation("content must not be empty".into()));
        }
        if content.len() > self.max_content_bytes {
            return Err(CourierError::Validation(format!(
                "content is {} bytes, limit is {}",
                content.len(),
                self.max_content_bytes
            )));
        }
        #[cfg(test)]
        self.trip_poison(&content);

        let (id, timestamp) = self.clock.issue();
        let message = Message {
            id: id.clone(),
            from: from.clone(),
            to,
            content,
            timestamp,
        };
        self.history.append(message.clone());

        let outcome = if self.deliver_live(&message) {
            debug!(message_id = %id, to = %message.to, "delivered live");
            SubmitOutcome::Delivered(id.clone())
        } else {
            info!(message_id = %id, to = %message.to, "buffered for offline recipient");
            self.offline.enqueue(message);
            SubmitOutcome::Queued(id.clone())
        };

        self.notify(from, ServerFrame::ack(id));
        Ok(outcome)
    }

    /// Try to hand `message` to the recipient's open connection.
    ///
    /// Returns `false` when it has to be buffered instead: no connection,
    /// a closed connection, or older messages still waiting in the queue.
    fn deliver_live(&self, message: &Message) -> bool {
        if self.offline.depth(&message.to) > 0 {
            return false;
        }
        let Some(handle) = self.registry.lookup(&message.to) else {
            return false;
        };
        if !handle.is_open() {
            return false;
        }
        match handle.send(ServerFrame::Message(message.clone())) {
            Ok(()) => true,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "live delivery failed");
                false
            }
        }
    }

    /// Send every buffered message for `identity` to `handle`, oldest first.
    ///
    /// Nothing is taken if the handle is not open. If the handle closes
    /// part-way, the rest goes back to the front of the queue.
    fn flush(&mut self, identity: &Identity, handle: &ConnectionHandle) -> usize {
        if !handle.is_open() {
            return 0;
        }
        let Some(mut pending) = self.offline.take(identity) else {
            return 0;
        };

        let mut delivered = 0;
        while let Some(message) = pending.pop_front() {
            if let Err(e) = handle.send(ServerFrame::Message(message.clone())) {
                warn!(identity = %identity, error = %e, remaining = pending.len() + 1, "flush interrupted");
                pending.push_front(message);
                break;
            }
            delivered += 1;
        }
        self.offline.restore(identity, pending);

        if delivered > 0 {
            info!(identity = %identity, delivered, "delivered buffered messages");
        }
        delivered
    }

    /// Send a control frame to `identity`'s registered connection if it is open.
    fn notify(&self, identity: &Identity, frame: ServerFrame) -> bool {
        match self.registry.lookup(identity) {
            Some(handle) if handle.is_open() => handle.send(frame).is_ok(),
            _ => {
                debug!(identity = %identity, "sender no longer connected, dropping control frame");
                false
            }
        }
    }

    #[cfg(test)]
    fn trip_poison(&self, content: &str) {
        if self.poison_content.as_deref() == Some(content) {
            panic!("poisoned content");
        }
    }

    pub fn history(&self, a: &Identity, b: &Identity) -> Conversation {
        self.history.conversation(a, b)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            active_users: self.registry.identities(),
            queued_messages: self.offline.depths(),
            total_chats: self.history.conversation_count(),
        }
    }
}

fn fault_message(fault: &(dyn Any + Send)) -> String {
    if let Some(message) = fault.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = fault.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
