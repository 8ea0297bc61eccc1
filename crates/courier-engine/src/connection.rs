// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handle to a single open client connection.
//!
//! The gateway owns the socket; the engine only ever sees the sending half
//! of a channel drained by the connection's writer task. Frames pushed here
//! are written in FIFO order after the engine moves on.
//!
//! The channel never blocks the engine, but its backlog is capped. A client
//! that stops reading trips the cap, after which the handle reports itself
//! closed and the gateway drops the socket.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use courier_core::{ConnectionId, CourierError, ServerFrame};
use tokio::sync::{Notify, mpsc};

/// WebSocket close code for policy violations (RFC 6455 §7.4.1).
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Close reason for a connection whose unread backlog hit the cap.
pub const BACKLOG_EXCEEDED_REASON: &str = "outbound backlog exceeded";

/// Default cap on frames queued for one connection's writer.
pub const DEFAULT_MAX_PENDING_FRAMES: usize = 1024;

/// Instructions consumed by a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialize and write a frame.
    Frame(ServerFrame),
    /// Write a close frame and stop.
    Close { code: u16, reason: String },
}

/// Pending-frame accounting shared by a handle and its receiver.
#[derive(Debug)]
struct Backlog {
    pending: AtomicUsize,
    limit: usize,
    exceeded: AtomicBool,
    tripped: Notify,
}

impl Backlog {
    fn trip(&self) {
        if !self.exceeded.swap(true, Ordering::AcqRel) {
            self.tripped.notify_waiters();
        }
    }

    fn is_exceeded(&self) -> bool {
        self.exceeded.load(Ordering::Acquire)
    }

    async fn wait_exceeded(&self) {
        let mut notified = pin!(self.tripped.notified());
        notified.as_mut().enable();
        if self.is_exceeded() {
            return;
        }
        notified.await;
    }
}

/// Cloneable sending side of one connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
    backlog: Arc<Backlog>,
}

/// Receiving side of one connection, drained by its writer task.
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::UnboundedReceiver<Outbound>,
    backlog: Arc<Backlog>,
}

impl ConnectionHandle {
    /// Create a handle with the default backlog cap.
    pub fn new(id: ConnectionId) -> (Self, OutboundReceiver) {
        Self::with_limit(id, DEFAULT_MAX_PENDING_FRAMES)
    }

    /// Create a handle whose writer may fall at most `limit` frames behind.
    pub fn with_limit(id: ConnectionId, limit: usize) -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backlog = Arc::new(Backlog {
            pending: AtomicUsize::new(0),
            limit: limit.max(1),
            exceeded: AtomicBool::new(false),
            tripped: Notify::new(),
        });
        (
            Self {
                id,
                tx,
                backlog: Arc::clone(&backlog),
            },
            OutboundReceiver { rx, backlog },
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the writer task is still draining this handle.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed() && !self.backlog.is_exceeded()
    }

    /// Queue a frame for the writer task.
    ///
    /// Fails once the writer is gone or the backlog cap has been hit. Hitting
    /// the cap closes the handle for good.
    pub fn send(&self, frame: ServerFrame) -> Result<(), CourierError> {
        if self.backlog.is_exceeded() {
            return Err(self.closed_error());
        }
        if self.backlog.pending.load(Ordering::Acquire) >= self.backlog.limit {
            self.backlog.trip();
            return Err(CourierError::Delivery {
                identity: self.id.to_string(),
                message: format!("{BACKLOG_EXCEEDED_REASON} ({} frames)", self.backlog.limit),
            });
        }
        self.push(Outbound::Frame(frame))
    }

    /// Ask the writer task to close the socket. Not subject to the cap.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> Result<(), CourierError> {
        self.push(Outbound::Close {
            code,
            reason: reason.into(),
        })
    }

    /// Resolves once the backlog cap has been hit.
    pub async fn overloaded(&self) {
        self.backlog.wait_exceeded().await;
    }

    fn push(&self, item: Outbound) -> Result<(), CourierError> {
        self.backlog.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.send(item).map_err(|_| {
            self.backlog.pending.fetch_sub(1, Ordering::AcqRel);
            self.closed_error()
        })
    }

    fn closed_error(&self) -> CourierError {
        CourierError::Delivery {
            identity: self.id.to_string(),
            message: "connection already closed".into(),
        }
    }
}

impl OutboundReceiver {
    /// Next queued instruction, or `None` once every handle is dropped.
    pub async fn recv(&mut self) -> Option<Outbound> {
        let item = self.rx.recv().await;
        if item.is_some() {
            self.backlog.pending.fetch_sub(1, Ordering::AcqRel);
        }
        item
    }

    pub fn try_recv(&mut self) -> Result<Outbound, mpsc::error::TryRecvError> {
        let item = self.rx.try_recv()?;
        self.backlog.pending.fetch_sub(1, Ordering::AcqRel);
        Ok(item)
    }

    /// Stop accepting new instructions. Already queued ones stay readable.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// A watcher for the backlog cap that can be awaited alongside `recv`.
    pub fn overload_signal(&self) -> OverloadSignal {
        OverloadSignal(Arc::clone(&self.backlog))
    }
}

/// Fires once a connection's backlog cap has been hit.
#[derive(Debug, Clone)]
pub struct OverloadSignal(Arc<Backlog>);

impl OverloadSignal {
    pub async fn wait(&self) {
        self.0.wait_exceeded().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::MessageId;

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (handle, mut rx) = ConnectionHandle::new(ConnectionId(1));
        handle.send(ServerFrame::ack(MessageId("msg-1".into()))).unwrap();
        handle.send(ServerFrame::ack(MessageId("msg-2".into()))).unwrap();

        assert_eq!(
            rx.recv().await,
            Some(Outbound::Frame(ServerFrame::ack(MessageId("msg-1".into()))))
        );
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Frame(ServerFrame::ack(MessageId("msg-2".into()))))
        );
    }

    #[test]
    fn send_after_receiver_dropped_fails() {
        let (handle, rx) = ConnectionHandle::new(ConnectionId(1));
        drop(rx);
        assert!(!handle.is_open());

        let err = handle.send(ServerFrame::nack("gone")).unwrap_err();
        assert!(matches!(err, CourierError::Delivery { .. }));
        assert!(handle.close(CLOSE_POLICY_VIOLATION, "bye").is_err());
    }

    #[tokio::test]
    async fn backlog_cap_closes_the_handle() {
        let (handle, mut rx) = ConnectionHandle::with_limit(ConnectionId(1), 2);
        handle.send(ServerFrame::nack("one")).unwrap();
        handle.send(ServerFrame::nack("two")).unwrap();
        assert!(handle.is_open());

        let err = handle.send(ServerFrame::nack("three")).unwrap_err();
        assert!(err.to_string().contains(BACKLOG_EXCEEDED_REASON));
        assert!(!handle.is_open());
        let signal = rx.overload_signal();
        tokio::time::timeout(std::time::Duration::from_secs(1), signal.wait())
            .await
            .expect("receiver should observe the overload");

        // Draining does not reopen a tripped handle.
        while rx.try_recv().is_ok() {}
        assert!(handle.send(ServerFrame::nack("four")).is_err());
    }

    #[test]
    fn draining_frees_backlog_space() {
        let (handle, mut rx) = ConnectionHandle::with_limit(ConnectionId(1), 1);
        for i in 0..5 {
            handle.send(ServerFrame::nack(format!("n{i}"))).unwrap();
            assert!(rx.try_recv().is_ok());
        }
        assert!(handle.is_open());
    }
}
