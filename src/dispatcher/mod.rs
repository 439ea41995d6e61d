//! Request dispatcher: the entry point callers use.
//!
//! The dispatcher resolves a request to a pool key, reserves a stream slot,
//! opens the stream and awaits its classified outcome. Reservation and open
//! behave as one step with respect to a drain: if the connection stops
//! accepting streams between the two, the open is rejected before any byte is
//! written and the dispatcher reserves again.

mod builder;
mod tracing_config;
mod tracing_helpers;

use std::{sync::Arc, time::Instant};

pub use builder::DispatcherBuilder;
use log::{debug, info};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::Instrument;
pub use tracing_config::TracingConfig;
use tracing_helpers::{
    close_span,
    emit_timing_event,
    execute_span,
    record_result,
    start_span,
};

use crate::{
    config::DispatcherConfig,
    destination::{Destination, PoolKey},
    error::{ErrorKind, RequestError},
    metrics,
    pool::{ConnectionPool, PoolStats},
    session::ConnectionId,
    stream::{Request, Response, StreamHandle},
    transport::{Connector, TcpConnector},
};

/// Multiplexing request dispatcher.
///
/// # Examples
///
/// ```no_run
/// use muxpool::{Destination, Dispatcher, Request, Scheme};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let dispatcher = Dispatcher::builder().build_tcp()?;
/// let destination = Destination::new(Scheme::Http, "localhost", 8080);
/// let response = dispatcher.execute(Request::new(destination, "GET /")).await?;
/// println!("{} body bytes", response.body().len());
/// dispatcher.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher<C = TcpConnector> {
    pool: ConnectionPool<C>,
    config: Arc<DispatcherConfig>,
    tracing: TracingConfig,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Dispatcher<TcpConnector> {
    /// Start configuring a dispatcher.
    #[must_use]
    pub fn builder() -> DispatcherBuilder { DispatcherBuilder::new() }
}

impl<C: Connector> Dispatcher<C> {
    pub(crate) fn new(connector: C, config: DispatcherConfig, tracing: TracingConfig) -> Self {
        let config = Arc::new(config);
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let pool = ConnectionPool::new(
            connector,
            Arc::clone(&config),
            shutdown.clone(),
            tracker.clone(),
        );
        Self {
            pool,
            config,
            tracing,
            shutdown,
            tracker,
        }
    }

    /// Send `request` and wait for its complete response.
    ///
    /// The configured request timeout, if any, bounds the whole exchange
    /// including connection acquisition.
    ///
    /// # Errors
    ///
    /// Returns the classified [`RequestError`] of the exchange.
    pub async fn execute(&self, request: Request) -> Result<Response, RequestError> {
        let span = execute_span(&self.tracing, request.destination());
        let timing = self.tracing.execute_timing.then(Instant::now);
        let exchange = async {
            let handle = self.open(request).await?;
            tracing::Span::current().record("stream.id", handle.id().as_u32());
            tracing::Span::current().record("connection.id", handle.connection_id().as_u64());
            handle.response().await
        };
        let outcome = match self.config.request_timeout() {
            Some(after) => tokio::time::timeout(after, exchange.instrument(span.clone()))
                .await
                .unwrap_or_else(|_| {
                    metrics::inc_errors(ErrorKind::Timeout);
                    debug!("request timed out: after={after:?}");
                    Err(RequestError::Timeout { after })
                }),
            None => exchange.instrument(span.clone()).await,
        };
        record_result(&span, &outcome);
        let _entered = span.enter();
        emit_timing_event(timing);
        outcome
    }

    /// Open a stream for `request` and return its handle without waiting for
    /// the response.
    ///
    /// The request timeout does not apply; the caller decides how long to wait
    /// on [`StreamHandle::response`].
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Connect`] or [`RequestError::DispatcherClosed`]
    /// when no stream could be opened.
    pub async fn start(&self, request: Request) -> Result<StreamHandle, RequestError> {
        let span = start_span(&self.tracing, request.destination());
        let timing = self.tracing.start_timing.then(Instant::now);
        let handle = async {
            let handle = self.open(request).await?;
            tracing::Span::current().record("stream.id", handle.id().as_u32());
            tracing::Span::current().record("connection.id", handle.connection_id().as_u64());
            Ok(handle)
        }
        .instrument(span.clone())
        .await;
        let _entered = span.enter();
        emit_timing_event(timing);
        handle
    }

    async fn open(&self, request: Request) -> Result<StreamHandle, RequestError> {
        let key = PoolKey::new(request.destination().clone(), self.config.protocol());
        loop {
            let reservation = self.pool.acquire(&key).await?;
            match reservation.open(request.clone()).await {
                Ok(handle) => return Ok(handle),
                Err(rejected) => debug!("open rejected, acquiring again: key={key}, reason={rejected}"),
            }
        }
    }

    /// Close the dispatcher.
    ///
    /// Outstanding acquisitions fail, every stream in flight fails with
    /// [`RequestError::DispatcherClosed`], and the call returns once every
    /// connection task has finished.
    pub async fn close(&self) {
        let span = close_span(&self.tracing);
        let timing = self.tracing.close_timing.then(Instant::now);
        async {
            info!(
                "closing dispatcher: live_connections={}",
                self.pool.live_connections().len()
            );
            self.pool.close();
            self.tracker.close();
            self.tracker.wait().await;
            info!("dispatcher closed");
        }
        .instrument(span.clone())
        .await;
        let _entered = span.enter();
        emit_timing_event(timing);
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.shutdown.is_cancelled() }

    /// Pool statistics for `destination` under the configured protocol.
    #[must_use]
    pub fn stats(&self, destination: &Destination) -> PoolStats {
        self.pool
            .stats(&PoolKey::new(destination.clone(), self.config.protocol()))
    }

    /// Close one connection, failing only the streams it carries.
    ///
    /// Returns `false` when no live connection has that id.
    pub fn close_connection(&self, id: ConnectionId) -> bool { self.pool.close_connection(id) }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &ConnectionPool<C> { &self.pool }

    /// Configuration in force.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig { &self.config }
}

#[cfg(test)]
mod tests;
