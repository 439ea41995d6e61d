//! Connection actor owning one pooled transport.
//!
//! Each connection runs as a single task that owns the framed transport, the
//! registry of in-flight streams, the health monitor and the shutdown
//! watermark. The task multiplexes inbound frames, commands from the pool and
//! stream handles, queued writes and its timers in one `tokio::select!` loop,
//! so every state change of the connection happens in one place and in one
//! order. Writes never block the loop; a stalled transport leaves the timers
//! and shutdown free to fire.
//!
//! The pool sees the connection through a [`ConnectionHandle`] and the atomic
//! [`ConnectionShared`] state it uses to reserve capacity without a round trip
//! to the actor.

mod counter;
mod dispatch;
mod event;
mod goaway;
mod handle;
mod handshake;
mod health;
mod outbound;
mod shutdown;
mod state;
mod streams;

use std::{sync::Arc, time::Duration};

use counter::ActiveConnection;
pub use counter::active_connection_count;
use event::{CloseCause, Event};
pub(crate) use event::Command;
use futures::{
    StreamExt,
    stream::{SplitSink, SplitStream},
};
use goaway::GoAwayTracker;
pub(crate) use handle::{ConnectionEvents, ConnectionHandle, ConnectionShared};
pub use handle::OpenRejected;
pub(crate) use handshake::establish;
use health::HealthMonitor;
use log::info;
use outbound::Outbound;
pub use state::ConnectionState;
use streams::StreamRegistry;
use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until},
};
use tokio_util::{codec::Framed, sync::CancellationToken};

use crate::{
    config::DispatcherConfig,
    destination::PoolKey,
    frame::{Frame, FrameCodec},
    session::ConnectionId,
    transport::TransportStream,
};

/// Actor driving one pooled connection.
pub(crate) struct ConnectionActor<Io> {
    reader: SplitStream<Framed<Io, FrameCodec>>,
    writer: SplitSink<Framed<Io, FrameCodec>, Frame>,
    outbound: Outbound,
    shared: Arc<ConnectionShared>,
    commands: mpsc::UnboundedReceiver<Command>,
    stream_commands: mpsc::WeakUnboundedSender<Command>,
    streams: StreamRegistry,
    goaway: GoAwayTracker,
    health: HealthMonitor,
    read_timeout: Option<Duration>,
    last_read: Instant,
    max_streams: u32,
    events: Arc<dyn ConnectionEvents>,
    shutdown: CancellationToken,
    _counter: ActiveConnection,
}

impl<Io: TransportStream> ConnectionActor<Io> {
    /// Build an actor for a handshaken transport.
    ///
    /// `peer_limit` is the concurrent-stream cap the peer announced, if any.
    pub(crate) fn new(
        framed: Framed<Io, FrameCodec>,
        id: ConnectionId,
        key: PoolKey,
        peer_limit: Option<u32>,
        config: &DispatcherConfig,
        events: Arc<dyn ConnectionEvents>,
        shutdown: CancellationToken,
    ) -> (ConnectionHandle, Self) {
        let max_streams = config.max_concurrent_streams();
        let capacity = peer_limit.map_or(max_streams, |limit| limit.clamp(1, max_streams));
        let shared = Arc::new(ConnectionShared::new(id, key, capacity));
        let (tx, rx) = mpsc::unbounded_channel();
        let now = Instant::now();
        let (writer, reader) = framed.split();
        let actor = Self {
            reader,
            writer,
            outbound: Outbound::default(),
            shared: Arc::clone(&shared),
            commands: rx,
            stream_commands: tx.downgrade(),
            streams: StreamRegistry::new(),
            goaway: GoAwayTracker::default(),
            health: HealthMonitor::new(config.health_check(), now),
            read_timeout: config.read_timeout(),
            last_read: now,
            max_streams,
            events,
            shutdown,
            _counter: ActiveConnection::new(),
        };
        (ConnectionHandle::new(shared, tx), actor)
    }

    /// Drive the connection until it closes.
    pub(crate) async fn run(mut self) {
        info!(
            "connection opened: id={}, key={}, capacity={}, active_connections={}",
            self.shared.id(),
            self.shared.key(),
            self.shared.capacity(),
            active_connection_count(),
        );
        let cause = loop {
            let event = self.next_event().await;
            if let Some(cause) = self.dispatch_event(event) {
                break cause;
            }
            if self.shared.state() == ConnectionState::Closed {
                break CloseCause::Drained;
            }
        };
        self.close(cause).await;
    }

    async fn next_event(&mut self) -> Event {
        let health_deadline = self.health.next_deadline();
        let read_deadline = self.read_timeout.map(|timeout| self.last_read + timeout);
        tokio::select! {
            biased;

            () = self.shutdown.cancelled() => Event::Shutdown,
            frame = self.reader.next() => Event::Inbound(frame),
            command = self.commands.recv() => Event::Command(command),
            written = self.outbound.drive(&mut self.writer), if self.outbound.has_work() => {
                Event::Written(written)
            }
            () = sleep_until_opt(health_deadline) => Event::HealthTimer,
            () = sleep_until_opt(read_deadline) => Event::ReadTimeout,
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
