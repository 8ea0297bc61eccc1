// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cloneable client for the processor task.

use std::sync::Arc;

use courier_core::{ConnectionId, CourierError, Identity};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::connection::{ConnectionHandle, OutboundReceiver};
use crate::history::Conversation;
use crate::processor::{
    Command, ConnectReport, EngineConfig, MessageProcessor, StatusSnapshot, SubmitOutcome,
};
use crate::registry::ConnectionRegistry;

/// Spawn the processor task and return a handle to it.
///
/// The task exits once every [`EngineHandle`] clone has been dropped.
pub fn spawn_engine(config: EngineConfig) -> (EngineHandle, JoinHandle<()>) {
    let registry = Arc::new(ConnectionRegistry::new());
    let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));
    let processor = MessageProcessor::new(Arc::clone(&registry), &config);
    let task = tokio::spawn(processor.run(rx));
    (
        EngineHandle {
            commands: tx,
            registry,
            max_pending_frames: config.max_pending_frames,
        },
        task,
    )
}

/// Async front door to the engine. Every call is applied in mailbox order.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    registry: Arc<ConnectionRegistry>,
    max_pending_frames: usize,
}

impl EngineHandle {
    /// Create a handle for a new, not yet registered connection.
    pub fn open_connection(&self) -> (ConnectionHandle, OutboundReceiver) {
        ConnectionHandle::with_limit(self.registry.next_connection_id(), self.max_pending_frames)
    }

    /// Register a connection and flush any messages buffered for it.
    pub async fn connect(
        &self,
        identity: Identity,
        handle: ConnectionHandle,
    ) -> Result<ConnectReport, CourierError> {
        self.request(|reply| Command::Connect {
            identity,
            handle,
            reply,
        })
        .await
    }

    /// Unregister `connection` if it is still the one registered for `identity`.
    pub async fn disconnect(
        &self,
        identity: Identity,
        connection: ConnectionId,
    ) -> Result<bool, CourierError> {
        self.request(|reply| Command::Disconnect {
            identity,
            connection,
            reply,
        })
        .await
    }

    /// Submit a chat message on behalf of `from`'s registered `connection`.
    pub async fn submit(
        &self,
        from: Identity,
        connection: ConnectionId,
        to: Identity,
        content: String,
    ) -> Result<SubmitOutcome, CourierError> {
        self.request(|reply| Command::Submit {
            from,
            connection,
            to,
            content,
            reply,
        })
        .await
    }

    /// Conversation between two identities, oldest first.
    pub async fn history(&self, a: Identity, b: Identity) -> Result<Conversation, CourierError> {
        self.request(|reply| Command::History { a, b, reply }).await
    }

    pub async fn snapshot(&self) -> Result<StatusSnapshot, CourierError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CourierError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| CourierError::EngineUnavailable)?;
        rx.await.map_err(|_| CourierError::EngineUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Outbound;
    use courier_core::ServerFrame;

    #[tokio::test]
    async fn round_trip_through_the_task() {
        let (engine, _task) = spawn_engine(EngineConfig::default());

        let (alice, mut alice_rx) = engine.open_connection();
        let (bob, mut bob_rx) = engine.open_connection();
        let alice_id = alice.id();
        engine.connect("alice".into(), alice).await.unwrap();
        engine.connect("bob".into(), bob).await.unwrap();

        let outcome = engine
            .submit("alice".into(), alice_id, "bob".into(), "hello".into())
            .await
            .unwrap();
        let id = match outcome {
            SubmitOutcome::Delivered(id) => id,
            other => panic!("expected Delivered, got {other:?}"),
        };

        match bob_rx.recv().await {
            Some(Outbound::Frame(ServerFrame::Message(m))) => assert_eq!(m.id, id),
            other => panic!("unexpected outbound {other:?}"),
        }
        assert_eq!(
            alice_rx.recv().await,
            Some(Outbound::Frame(ServerFrame::ack(id)))
        );

        let convo = engine.history("bob".into(), "alice".into()).await.unwrap();
        assert_eq!(convo.messages.len(), 1);
        assert_eq!(convo.chat_key.to_string(), "alice:bob");
    }

    #[tokio::test]
    async fn concurrent_senders_are_serialized() {
        let (engine, _task) = spawn_engine(EngineConfig::default());
        let (bob, mut bob_rx) = engine.open_connection();
        engine.connect("bob".into(), bob).await.unwrap();

        let mut tasks = Vec::new();
        for sender in ["s1", "s2", "s3", "s4"] {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move {
                let (handle, _rx) = engine.open_connection();
                let connection = handle.id();
                engine.connect(sender.into(), handle).await.unwrap();
                for i in 0..25 {
                    engine
                        .submit(sender.into(), connection, "bob".into(), format!("{sender}-{i}"))
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut received = Vec::new();
        while let Ok(Outbound::Frame(ServerFrame::Message(m))) = bob_rx.try_recv() {
            received.push(m);
        }
        assert_eq!(received.len(), 100);

        // Per-sender order is preserved and delivery order matches history order.
        for sender in ["s1", "s2", "s3", "s4"] {
            let mine: Vec<&str> = received
                .iter()
                .filter(|m| m.from.as_str() == sender)
                .map(|m| m.content.as_str())
                .collect();
            let expected: Vec<String> = (0..25).map(|i| format!("{sender}-{i}")).collect();
            assert_eq!(mine, expected);

            let history = engine.history(sender.into(), "bob".into()).await.unwrap();
            let delivered_ids: Vec<_> = received
                .iter()
                .filter(|m| m.from.as_str() == sender)
                .map(|m| m.id.clone())
                .collect();
            let history_ids: Vec<_> = history.messages.into_iter().map(|m| m.id).collect();
            assert_eq!(history_ids, delivered_ids);
        }

        // Timestamps across all senders follow delivery order.
        assert!(received.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn dropped_engine_reports_unavailable() {
        let (engine, task) = spawn_engine(EngineConfig::default());
        task.abort();
        let _ = task.await;

        let err = engine.snapshot().await.unwrap_err();
        assert!(matches!(err, CourierError::EngineUnavailable));
    }

    #[tokio::test]
    async fn connections_inherit_the_backlog_cap() {
        let config = EngineConfig {
            max_pending_frames: 1,
            ..EngineConfig::default()
        };
        let (engine, _task) = spawn_engine(config);
        let (handle, _rx) = engine.open_connection();
        handle.send(ServerFrame::nack("first")).unwrap();
        assert!(handle.send(ServerFrame::nack("second")).is_err());
        assert!(!handle.is_open());
    }
}
