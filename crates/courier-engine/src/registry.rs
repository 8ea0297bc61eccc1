// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection registry: identity -> currently open connection handle.
//!
//! Reads and writes for different identities proceed in parallel. Connect and
//! disconnect for the same identity are serialized by the engine, which is
//! the only writer.

use std::sync::atomic::{AtomicU64, Ordering};

use courier_core::{ConnectionId, Identity};
use dashmap::DashMap;

use crate::connection::ConnectionHandle;

/// Live connections keyed by identity. At most one handle per identity.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Identity, ConnectionHandle>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a connection that has not been registered yet.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Register `handle` for `identity`, returning the handle it replaced.
    ///
    /// The replaced handle is not closed here; the engine decides what to do
    /// with it.
    pub fn register(&self, identity: Identity, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.connections.insert(identity, handle)
    }

    /// Remove the entry for `identity` only if it still belongs to `connection`.
    ///
    /// Returns `true` if an entry was removed. A stale disconnect from a
    /// superseded connection leaves the newer registration untouched.
    pub fn unregister(&self, identity: &Identity, connection: ConnectionId) -> bool {
        self.connections
            .remove_if(identity, |_, handle| handle.id() == connection)
            .is_some()
    }

    /// Whether `connection` is the one registered for `identity`.
    pub fn is_current(&self, identity: &Identity, connection: ConnectionId) -> bool {
        self.connections
            .get(identity)
            .is_some_and(|entry| entry.value().id() == connection)
    }

    pub fn lookup(&self, identity: &Identity) -> Option<ConnectionHandle> {
        self.connections.get(identity).map(|entry| entry.value().clone())
    }

    /// Currently registered identities, sorted.
    pub fn identities(&self) -> Vec<Identity> {
        let mut ids: Vec<Identity> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
