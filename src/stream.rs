//! Requests, responses, and the handle of one in-flight exchange.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::{
    connection::Command,
    destination::Destination,
    error::RequestError,
    session::{ConnectionId, StreamId},
};

/// Wire-ready request produced by the marshalling layer.
///
/// The header block and body chunks are opaque to the pool; they are written
/// to the stream unchanged.
///
/// # Examples
///
/// ```
/// use muxpool::{Destination, Request, Scheme};
///
/// let request = Request::new(Destination::new(Scheme::Http, "localhost", 8080), "GET /")
///     .with_body_chunk("hello");
/// assert_eq!(request.body().len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct Request {
    destination: Destination,
    head: Bytes,
    body: Vec<Bytes>,
}

impl Request {
    /// Create a request with an empty body.
    #[must_use]
    pub fn new(destination: Destination, head: impl Into<Bytes>) -> Self {
        Self {
            destination,
            head: head.into(),
            body: Vec::new(),
        }
    }

    /// Append a body chunk.
    #[must_use]
    pub fn with_body_chunk(mut self, chunk: impl Into<Bytes>) -> Self {
        let chunk = chunk.into();
        if !chunk.is_empty() {
            self.body.push(chunk);
        }
        self
    }

    /// Destination the request is sent to.
    #[must_use]
    pub fn destination(&self) -> &Destination { &self.destination }

    /// Opaque header block.
    #[must_use]
    pub fn head(&self) -> &Bytes { &self.head }

    /// Body chunks in send order.
    #[must_use]
    pub fn body(&self) -> &[Bytes] { &self.body }
}

/// Fully received response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    head: Bytes,
    body: Bytes,
}

impl Response {
    pub(crate) fn new(head: Bytes, body: Bytes) -> Self { Self { head, body } }

    /// Opaque response header block.
    #[must_use]
    pub fn head(&self) -> &Bytes { &self.head }

    /// Complete response body.
    #[must_use]
    pub fn body(&self) -> &Bytes { &self.body }

    /// Split the response into header block and body.
    #[must_use]
    pub fn into_parts(self) -> (Bytes, Bytes) { (self.head, self.body) }
}

pub(crate) type Outcome = Result<Response, RequestError>;

/// Handle to one logical exchange on a pooled connection.
///
/// The handle resolves exactly once. Dropping it before the outcome is
/// collected cancels the stream: the connection resets it and frees its
/// capacity. The handle keeps only a weak reference to its connection, so an
/// outstanding handle never keeps a connection alive.
#[derive(Debug)]
pub struct StreamHandle {
    stream_id: StreamId,
    connection_id: ConnectionId,
    outcome: oneshot::Receiver<Outcome>,
    connection: mpsc::WeakUnboundedSender<Command>,
    finished: bool,
}

impl StreamHandle {
    pub(crate) fn new(
        stream_id: StreamId,
        connection_id: ConnectionId,
        outcome: oneshot::Receiver<Outcome>,
        connection: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        Self {
            stream_id,
            connection_id,
            outcome,
            connection,
            finished: false,
        }
    }

    /// Identifier of the stream on its connection.
    #[must_use]
    pub const fn id(&self) -> StreamId { self.stream_id }

    /// Identifier of the connection carrying the stream.
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId { self.connection_id }

    /// Wait for the terminal outcome of the exchange.
    ///
    /// # Errors
    ///
    /// Returns the classified [`RequestError`] the connection reported.
    pub async fn response(mut self) -> Result<Response, RequestError> {
        let outcome = (&mut self.outcome).await;
        self.finished = true;
        // The connection task never drops a stream without an outcome unless
        // the runtime itself is shutting down.
        outcome.unwrap_or(Err(RequestError::DispatcherClosed))
    }

    /// Drop the handle without cancelling its stream.
    pub(crate) fn disarm(mut self) { self.finished = true; }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(connection) = self.connection.upgrade() {
            let _ = connection.send(Command::Cancel {
                stream_id: self.stream_id,
            });
        }
    }
}
