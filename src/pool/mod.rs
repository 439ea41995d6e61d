//! Connection pool keyed by destination and protocol.
//!
//! The pool hands out [`Reservation`]s: a claim on one stream slot of an
//! `Active` connection. A reservation is taken with an atomic check of the
//! connection state and its in-flight count, so a connection that has begun
//! draining is never handed out again. When every connection to a key is full
//! and the connection limit is reached, callers wait until a slot frees up or
//! a connection retires.
//!
//! Connection attempts run in the acquiring task. A failed attempt is reported
//! only to that caller; waiters are woken and decide for themselves whether to
//! try again.

mod index;

use std::sync::{
    Arc,
    Weak,
    atomic::{AtomicU64, Ordering},
};

use index::{PoolEntry, PoolEvents, PoolIndex};
use log::{debug, info, warn};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::DispatcherConfig,
    connection::{self, ConnectionEvents, ConnectionHandle, OpenRejected},
    destination::PoolKey,
    error::RequestError,
    metrics,
    session::ConnectionId,
    stream::{Request, StreamHandle},
    transport::Connector,
};

/// Per-key pool statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections created over the lifetime of the pool.
    pub connections_created: u64,
    /// Connections not yet closed, draining ones included.
    pub live_connections: usize,
    /// Connections that may still be handed out.
    pub available_connections: usize,
    /// Connection attempts in progress.
    pub connecting: usize,
    /// Streams reserved or in flight across live connections.
    pub in_flight_streams: u64,
}

/// Claim on one stream slot of a pooled connection.
///
/// Dropping an unused reservation returns the slot.
#[derive(Debug)]
pub struct Reservation {
    handle: ConnectionHandle,
    index: Weak<PoolIndex>,
    armed: bool,
}

impl Reservation {
    fn new(handle: ConnectionHandle, index: Weak<PoolIndex>) -> Self {
        Self {
            handle,
            index,
            armed: true,
        }
    }

    /// Connection the slot belongs to.
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId { self.handle.id() }

    /// Open a stream for `request` on the reserved slot.
    ///
    /// # Errors
    ///
    /// Returns [`OpenRejected`] when the connection stopped accepting streams
    /// after the reservation was taken. No part of the request was written.
    pub async fn open(mut self, request: Request) -> Result<StreamHandle, OpenRejected> {
        self.armed = false;
        self.handle.open(request).await
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.handle.release();
        if let Some(index) = self.index.upgrade() {
            index.notify(self.handle.shared().key());
        }
    }
}

/// Decrements the in-progress attempt count unless the attempt was recorded.
struct PendingConnection<'a> {
    index: &'a PoolIndex,
    key: &'a PoolKey,
    armed: bool,
}

impl PendingConnection<'_> {
    fn complete(mut self, entry: &mut PoolEntry) {
        entry.connecting = entry.connecting.saturating_sub(1);
        entry.waiters.notify_waiters();
        self.armed = false;
    }
}

impl Drop for PendingConnection<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(mut entry) = self.index.entries.get_mut(self.key) {
            entry.connecting = entry.connecting.saturating_sub(1);
            entry.waiters.notify_waiters();
        }
    }
}

/// Pool of multiplexed connections.
pub struct ConnectionPool<C> {
    connector: C,
    config: Arc<DispatcherConfig>,
    index: Arc<PoolIndex>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl<C: Connector> ConnectionPool<C> {
    /// Create a pool whose connection tasks observe `shutdown` and run on
    /// `tracker`.
    #[must_use]
    pub fn new(
        connector: C,
        config: Arc<DispatcherConfig>,
        shutdown: CancellationToken,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            connector,
            config,
            index: Arc::new(PoolIndex::default()),
            next_id: AtomicU64::new(1),
            shutdown,
            tracker,
        }
    }

    /// Reserve a stream slot on a connection for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Connect`] when this call tried to create a
    /// connection and failed, and [`RequestError::DispatcherClosed`] once the
    /// pool is shutting down.
    pub async fn acquire(&self, key: &PoolKey) -> Result<Reservation, RequestError> {
        let limit = self.config.max_connections_per_destination();
        loop {
            if self.shutdown.is_cancelled() {
                return Err(RequestError::DispatcherClosed);
            }
            let mut entry = self.index.entries.entry(key.clone()).or_default();
            entry.available.retain(ConnectionHandle::is_active);
            if let Some(handle) = entry
                .available
                .iter()
                .find(|handle| handle.try_reserve())
                .cloned()
            {
                drop(entry);
                return Ok(Reservation::new(handle, Arc::downgrade(&self.index)));
            }
            if entry.available.len() + entry.connecting < limit {
                entry.connecting += 1;
                drop(entry);
                let pending = PendingConnection {
                    index: &self.index,
                    key,
                    armed: true,
                };
                if let Some(reservation) = self.create(key, pending).await? {
                    return Ok(reservation);
                }
                continue;
            }

            let waiters = Arc::clone(&entry.waiters);
            let notified = waiters.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            drop(entry);
            debug!("waiting for connection capacity: key={key}, limit={limit}");
            tokio::select! {
                () = &mut notified => {}
                () = self.shutdown.cancelled() => return Err(RequestError::DispatcherClosed),
            }
        }
    }

    async fn create(
        &self,
        key: &PoolKey,
        pending: PendingConnection<'_>,
    ) -> Result<Option<Reservation>, RequestError> {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let events: Arc<dyn ConnectionEvents> =
            Arc::new(PoolEvents(Arc::downgrade(&self.index)));
        let attempt = tokio::select! {
            result = connection::establish(
                &self.connector,
                id,
                key.clone(),
                &self.config,
                events,
                self.shutdown.clone(),
            ) => result.map_err(|source| RequestError::Connect {
                key: key.clone(),
                source,
            }),
            () = self.shutdown.cancelled() => Err(RequestError::DispatcherClosed),
        };

        let mut entry = self.index.entries.entry(key.clone()).or_default();
        pending.complete(&mut entry);
        let (handle, actor) = match attempt {
            Ok(pair) => pair,
            Err(e) => {
                drop(entry);
                warn!("connection attempt failed: key={key}, error={e}");
                if matches!(e, RequestError::Connect { .. }) {
                    metrics::inc_errors(e.kind());
                }
                return Err(e);
            }
        };
        entry.created += 1;
        entry.live += 1;
        entry.available.push(handle.clone());
        let reserved = handle.try_reserve();
        self.index.live.insert(id, handle.clone());
        drop(entry);

        metrics::inc_connections_created();
        info!("connection created: id={id}, key={key}");
        self.tracker.spawn(actor.run());
        Ok(reserved.then(|| Reservation::new(handle, Arc::downgrade(&self.index))))
    }

    /// Statistics for `key`.
    #[must_use]
    pub fn stats(&self, key: &PoolKey) -> PoolStats {
        let mut stats = self
            .index
            .entries
            .get(key)
            .map(|entry| entry.stats())
            .unwrap_or_default();
        stats.in_flight_streams = self
            .index
            .live
            .iter()
            .filter(|entry| entry.value().shared().key() == key)
            .map(|entry| u64::from(entry.value().shared().in_flight()))
            .sum();
        stats
    }

    /// Close one connection, failing only its own streams.
    ///
    /// Returns `false` when no live connection has that id.
    pub fn close_connection(&self, id: ConnectionId) -> bool {
        self.index
            .live
            .get(&id)
            .is_some_and(|handle| handle.close())
    }

    /// Stop the pool.
    ///
    /// Outstanding and future acquisitions fail with
    /// [`RequestError::DispatcherClosed`]; every connection task fails its
    /// streams and closes. Use the task tracker the pool was created with to
    /// wait for the tasks to finish.
    pub fn close(&self) {
        if !self.shutdown.is_cancelled() {
            debug!("closing pool: live_connections={}", self.index.live.len());
        }
        self.shutdown.cancel();
    }

    /// Identifiers of every live connection, draining ones included.
    #[must_use]
    pub fn live_connections(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.index.live.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Configuration shared with every connection.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig { &self.config }
}
