//! Registry of the streams in flight on one connection.

use std::{collections::BTreeMap, ops::Bound};

use bytes::{Bytes, BytesMut};
use tokio::sync::oneshot;

use crate::{
    error::{ClosePhase, RequestError},
    session::StreamId,
    stream::{Outcome, Response},
};

/// One in-flight exchange.
///
/// The phase reuses [`ClosePhase`] so a failing connection can report how far
/// each stream had progressed without translation.
#[derive(Debug)]
pub(super) struct StreamSlot {
    phase: ClosePhase,
    head: Option<Bytes>,
    body: BytesMut,
    responder: oneshot::Sender<Outcome>,
}

impl StreamSlot {
    fn new(responder: oneshot::Sender<Outcome>) -> Self {
        Self {
            phase: ClosePhase::BeforeRequestSent,
            head: None,
            body: BytesMut::new(),
            responder,
        }
    }

    pub(super) const fn phase(&self) -> ClosePhase { self.phase }

    /// Record progress. Progress never moves backwards.
    pub(super) fn advance(&mut self, phase: ClosePhase) { self.phase = self.phase.max(phase); }

    /// Record a response header block.
    ///
    /// A second block is treated as trailers and discarded.
    pub(super) fn on_headers(&mut self, block: Vec<u8>) {
        if self.head.is_none() {
            self.head = Some(Bytes::from(block));
        }
        self.advance(ClosePhase::AfterResponseHeaders);
    }

    pub(super) fn on_data(&mut self, payload: &[u8]) {
        self.body.extend_from_slice(payload);
        self.advance(ClosePhase::DuringResponsePayload);
    }

    /// Deliver the accumulated response.
    pub(super) fn succeed(self) {
        let head = self.head.unwrap_or_default();
        let _ = self.responder.send(Ok(Response::new(head, self.body.freeze())));
    }

    /// Deliver a failure.
    pub(super) fn fail(self, error: RequestError) { let _ = self.responder.send(Err(error)); }
}

/// Streams in flight on one connection, keyed by id.
#[derive(Debug)]
pub(super) struct StreamRegistry {
    next_id: Option<StreamId>,
    active: BTreeMap<StreamId, StreamSlot>,
}

impl StreamRegistry {
    pub(super) fn new() -> Self {
        Self {
            next_id: Some(StreamId::FIRST_CLIENT),
            active: BTreeMap::new(),
        }
    }

    /// Register a new stream under the next client identifier.
    ///
    /// Returns `None` once the identifier space is exhausted.
    pub(super) fn allocate(&mut self, responder: oneshot::Sender<Outcome>) -> Option<StreamId> {
        let id = self.next_id?;
        self.next_id = id.next_client();
        self.active.insert(id, StreamSlot::new(responder));
        Some(id)
    }

    /// Whether another stream can be allocated.
    pub(super) const fn has_ids(&self) -> bool { self.next_id.is_some() }

    pub(super) fn get_mut(&mut self, id: StreamId) -> Option<&mut StreamSlot> {
        self.active.get_mut(&id)
    }

    pub(super) fn remove(&mut self, id: StreamId) -> Option<StreamSlot> { self.active.remove(&id) }

    /// Identifiers strictly above `watermark`.
    pub(super) fn ids_above(&self, watermark: StreamId) -> Vec<StreamId> {
        self.active
            .range((Bound::Excluded(watermark), Bound::Unbounded))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Remove every stream, lowest id first.
    pub(super) fn take_all(&mut self) -> BTreeMap<StreamId, StreamSlot> {
        std::mem::take(&mut self.active)
    }

    pub(super) fn len(&self) -> usize { self.active.len() }

    pub(super) fn is_empty(&self) -> bool { self.active.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_odd_and_increasing() {
        let mut registry = StreamRegistry::new();
        let ids: Vec<_> = (0..3)
            .map(|_| registry.allocate(oneshot::channel().0).expect("id available"))
            .collect();
        assert_eq!(ids, [StreamId::new(1), StreamId::new(3), StreamId::new(5)]);
        assert_eq!(registry.ids_above(StreamId::new(1)), [StreamId::new(3), StreamId::new(5)]);
    }

    #[tokio::test]
    async fn response_accumulates_payload_chunks() {
        let mut registry = StreamRegistry::new();
        let (tx, rx) = oneshot::channel();
        let id = registry.allocate(tx).expect("id available");
        let slot = registry.get_mut(id).expect("slot");
        slot.on_headers(b"200".to_vec());
        slot.on_data(b"hello ");
        slot.on_data(b"world");
        assert_eq!(slot.phase(), ClosePhase::DuringResponsePayload);
        registry.remove(id).expect("slot").succeed();

        let response = rx.await.expect("outcome").expect("success");
        assert_eq!(response.head().as_ref(), b"200");
        assert_eq!(response.body().as_ref(), b"hello world");
    }

    #[test]
    fn phase_does_not_regress() {
        let mut slot = StreamSlot::new(oneshot::channel().0);
        slot.advance(ClosePhase::AfterResponseHeaders);
        slot.advance(ClosePhase::AwaitingResponseHeaders);
        assert_eq!(slot.phase(), ClosePhase::AfterResponseHeaders);
    }
}
