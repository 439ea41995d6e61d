//! In-memory connector handing the server half of each connection to a test.

use std::{
    collections::VecDeque,
    io,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use muxpool::{Connector, Destination};
use tokio::{
    io::{DuplexStream, duplex},
    sync::mpsc,
};

use crate::peer::PeerConnection;

const DUPLEX_BUFFER: usize = 64 * 1024;

/// Scripted behaviour of the next connection attempt.
#[derive(Clone, Copy, Debug)]
enum Injected {
    Fail(io::ErrorKind),
    Stall,
}

struct Inner {
    accepted: mpsc::UnboundedSender<PeerConnection>,
    attempts: AtomicUsize,
    injected: Mutex<VecDeque<Injected>>,
}

/// Connector backed by `tokio::io::duplex` pipes.
///
/// Every successful connect sends the server half, wrapped in a
/// [`PeerConnection`], to the paired [`PeerListener`].
#[derive(Clone)]
pub struct DuplexConnector {
    inner: Arc<Inner>,
}

/// Receives the server side of connections made through a [`DuplexConnector`].
pub struct PeerListener {
    accepted: mpsc::UnboundedReceiver<PeerConnection>,
}

impl DuplexConnector {
    /// Create a connector and the listener receiving its connections.
    #[must_use]
    pub fn new() -> (Self, PeerListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            accepted: tx,
            attempts: AtomicUsize::new(0),
            injected: Mutex::new(VecDeque::new()),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            PeerListener { accepted: rx },
        )
    }

    /// Fail the next connection attempt with an error of `kind`.
    pub fn fail_next(&self, kind: io::ErrorKind) { self.inject(Injected::Fail(kind)); }

    /// Make the next connection attempt hang forever.
    pub fn stall_next(&self) { self.inject(Injected::Stall); }

    /// Number of connection attempts made so far.
    #[must_use]
    pub fn attempts(&self) -> usize { self.inner.attempts.load(Ordering::SeqCst) }

    fn inject(&self, behaviour: Injected) {
        self.inner
            .injected
            .lock()
            .expect("injection queue poisoned")
            .push_back(behaviour);
    }
}

#[async_trait]
impl Connector for DuplexConnector {
    type Io = DuplexStream;

    async fn connect(&self, destination: &Destination) -> io::Result<DuplexStream> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .inner
            .injected
            .lock()
            .expect("injection queue poisoned")
            .pop_front();
        match injected {
            Some(Injected::Fail(kind)) => {
                return Err(io::Error::new(kind, "injected connect failure"));
            }
            Some(Injected::Stall) => std::future::pending::<()>().await,
            None => {}
        }
        let (client, server) = duplex(DUPLEX_BUFFER);
        let peer = PeerConnection::new(server, destination.clone());
        self.inner
            .accepted
            .send(peer)
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "listener dropped"))?;
        Ok(client)
    }
}

impl PeerListener {
    /// Wait for the next connection.
    ///
    /// # Panics
    ///
    /// Panics if no connection arrives within five seconds of (possibly
    /// paused) test time, or if the connector was dropped.
    pub async fn accept(&mut self) -> PeerConnection {
        tokio::time::timeout(Duration::from_secs(5), self.accepted.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    /// Accept the next connection and complete the settings handshake,
    /// announcing `max_concurrent_streams`.
    pub async fn accept_handshaken(&mut self, max_concurrent_streams: Option<u32>) -> PeerConnection {
        let mut peer = self.accept().await;
        peer.handshake(max_concurrent_streams).await;
        peer
    }

    /// Return a connection that has already arrived, if any.
    pub fn try_accept(&mut self) -> Option<PeerConnection> { self.accepted.try_recv().ok() }
}
