//! Index of live connections, grouped by pool key.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use log::debug;
use tokio::sync::Notify;

use super::PoolStats;
use crate::{
    connection::{ConnectionEvents, ConnectionHandle, ConnectionShared},
    destination::PoolKey,
    session::ConnectionId,
};

/// Per-key bookkeeping.
#[derive(Debug, Default)]
pub(super) struct PoolEntry {
    /// Connections that may still be handed out, in creation order.
    pub(super) available: Vec<ConnectionHandle>,
    /// Connection attempts in progress.
    pub(super) connecting: usize,
    /// Connections created over the lifetime of the pool.
    pub(super) created: u64,
    /// Connections created and not yet closed.
    pub(super) live: usize,
    /// Woken whenever capacity may have become available.
    pub(super) waiters: Arc<Notify>,
}

impl PoolEntry {
    pub(super) fn stats(&self) -> PoolStats {
        PoolStats {
            connections_created: self.created,
            live_connections: self.live,
            available_connections: self.available.len(),
            connecting: self.connecting,
            in_flight_streams: 0,
        }
    }
}

/// Shared index mutated by the pool and by connection events.
#[derive(Debug, Default)]
pub(crate) struct PoolIndex {
    pub(super) entries: DashMap<PoolKey, PoolEntry>,
    pub(super) live: DashMap<ConnectionId, ConnectionHandle>,
}

impl PoolIndex {
    pub(super) fn remove_available(&self, connection: &ConnectionShared) {
        if let Some(mut entry) = self.entries.get_mut(connection.key()) {
            entry.available.retain(|handle| handle.id() != connection.id());
            entry.waiters.notify_waiters();
        }
    }

    pub(super) fn notify(&self, key: &PoolKey) {
        if let Some(entry) = self.entries.get(key) {
            entry.waiters.notify_waiters();
        }
    }
}

/// Connection events routed to a pool index that may already be gone.
pub(super) struct PoolEvents(pub(super) Weak<PoolIndex>);

impl ConnectionEvents for PoolEvents {
    fn retired(&self, connection: &ConnectionShared) {
        if let Some(index) = self.0.upgrade() {
            debug!("connection retired: id={}, key={}", connection.id(), connection.key());
            index.remove_available(connection);
        }
    }

    fn capacity_released(&self, connection: &ConnectionShared) {
        if let Some(index) = self.0.upgrade() {
            index.notify(connection.key());
        }
    }

    fn closed(&self, connection: &ConnectionShared) {
        let Some(index) = self.0.upgrade() else {
            return;
        };
        index.live.remove(&connection.id());
        if let Some(mut entry) = index.entries.get_mut(connection.key()) {
            entry.available.retain(|handle| handle.id() != connection.id());
            entry.live = entry.live.saturating_sub(1);
            entry.waiters.notify_waiters();
        }
    }
}
