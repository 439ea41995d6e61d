//! Pool-side view of a connection.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::{
    event::Command,
    state::{ConnectionState, StateCell},
};
use crate::{
    destination::PoolKey,
    session::ConnectionId,
    stream::{Request, StreamHandle},
};

/// Returned when a reserved connection refuses to open a stream.
///
/// The connection stopped accepting streams between reservation and open.
/// Nothing was written for the request, so it is safe to retry elsewhere.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("{0} no longer accepts new streams")]
pub struct OpenRejected(pub ConnectionId);

/// Notifications from a connection to whoever indexes it.
pub(crate) trait ConnectionEvents: Send + Sync + 'static {
    /// The connection stopped accepting new streams.
    fn retired(&self, connection: &ConnectionShared);
    /// A stream slot became free.
    fn capacity_released(&self, connection: &ConnectionShared);
    /// The connection closed.
    fn closed(&self, connection: &ConnectionShared);
}

/// State shared between a connection actor and the pool.
#[derive(Debug)]
pub(crate) struct ConnectionShared {
    id: ConnectionId,
    key: PoolKey,
    state: StateCell,
    reserved: AtomicU32,
    capacity: AtomicU32,
}

impl ConnectionShared {
    pub(crate) fn new(id: ConnectionId, key: PoolKey, capacity: u32) -> Self {
        Self {
            id,
            key,
            state: StateCell::new(),
            reserved: AtomicU32::new(0),
            capacity: AtomicU32::new(capacity.max(1)),
        }
    }

    pub(crate) const fn id(&self) -> ConnectionId { self.id }

    pub(crate) const fn key(&self) -> &PoolKey { &self.key }

    pub(crate) fn state(&self) -> ConnectionState { self.state.load() }

    pub(super) fn advance(&self, to: ConnectionState) -> Option<ConnectionState> {
        self.state.advance(to)
    }

    /// Streams reserved or in flight.
    pub(crate) fn in_flight(&self) -> u32 { self.reserved.load(Ordering::Acquire) }

    pub(crate) fn capacity(&self) -> u32 { self.capacity.load(Ordering::Acquire) }

    pub(super) fn set_capacity(&self, capacity: u32) {
        self.capacity.store(capacity.max(1), Ordering::Release);
    }

    /// Claim one stream slot if the connection is active and below capacity.
    pub(crate) fn try_reserve(&self) -> bool {
        if self.state() != ConnectionState::Active {
            return false;
        }
        let capacity = self.capacity();
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |reserved| {
                (reserved < capacity).then_some(reserved + 1)
            })
            .is_ok()
    }

    /// Return one stream slot.
    pub(crate) fn release(&self) {
        let _ = self
            .reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |reserved| {
                reserved.checked_sub(1)
            });
    }
}

/// Cloneable handle the pool keeps for each live connection.
#[derive(Clone, Debug)]
pub(crate) struct ConnectionHandle {
    shared: Arc<ConnectionShared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl ConnectionHandle {
    pub(super) fn new(
        shared: Arc<ConnectionShared>,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self { shared, commands }
    }

    pub(crate) fn id(&self) -> ConnectionId { self.shared.id() }

    pub(crate) fn shared(&self) -> &ConnectionShared { &self.shared }

    pub(crate) fn is_active(&self) -> bool { self.shared.state() == ConnectionState::Active }

    pub(crate) fn try_reserve(&self) -> bool { self.shared.try_reserve() }

    pub(crate) fn release(&self) { self.shared.release(); }

    /// Open a stream on a slot reserved with [`try_reserve`](Self::try_reserve).
    ///
    /// The reservation passes to the connection actor, which releases it if it
    /// rejects the request.
    pub(crate) async fn open(&self, request: Request) -> Result<StreamHandle, OpenRejected> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Open { request, reply }).is_err() {
            return Err(OpenRejected(self.id()));
        }
        response
            .await
            .unwrap_or_else(|_| Err(OpenRejected(self.id())))
    }

    /// Ask the actor to close the connection.
    pub(crate) fn close(&self) -> bool { self.commands.send(Command::Close).is_ok() }
}
