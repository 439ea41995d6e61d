//! Stream completion, draining and teardown for the connection actor.
//!
//! Pool bookkeeping always happens before a stream's outcome is delivered, so a
//! caller that observes an outcome also observes the pool state that caused it.

use std::time::Duration;

use futures::SinkExt;
use log::{debug, info, warn};

use super::{ConnectionActor, ConnectionState, event::CloseCause};
use crate::{
    error::RequestError,
    frame::Frame,
    metrics,
    session::StreamId,
    transport::TransportStream,
};

/// Upper bound on flushing queued frames and the goodbye during a graceful
/// close.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

impl<Io: TransportStream> ConnectionActor<Io> {
    /// Deliver the response of a stream the peer finished.
    pub(super) fn finish_stream(&mut self, id: StreamId) {
        let Some(slot) = self.streams.remove(id) else {
            return;
        };
        self.release_slot();
        self.settle();
        slot.succeed();
    }

    /// Fail a single stream, leaving the connection running.
    ///
    /// Request frames of the stream that are still queued are dropped.
    pub(super) fn fail_stream(&mut self, id: StreamId, error: RequestError) {
        let Some(slot) = self.streams.remove(id) else {
            return;
        };
        self.outbound.discard_stream(id);
        debug!(
            "stream failed: id={}, stream_id={id}, kind={}",
            self.shared.id(),
            error.kind().as_str()
        );
        metrics::inc_errors(error.kind());
        self.release_slot();
        self.settle();
        slot.fail(error);
    }

    pub(super) fn release_slot(&self) {
        self.shared.release();
        metrics::dec_streams();
        self.events.capacity_released(&self.shared);
    }

    /// Close a draining connection once its last stream has finished.
    pub(super) fn settle(&mut self) {
        if self.shared.state() == ConnectionState::Draining && self.streams.is_empty() {
            self.mark_closed();
        }
    }

    /// Stop handing the connection out. Existing streams continue.
    pub(super) fn begin_drain(&mut self, reason: &str) {
        if self.shared.advance(ConnectionState::Draining).is_some() {
            info!(
                "connection draining: id={}, reason={reason}, active_streams={}",
                self.shared.id(),
                self.streams.len()
            );
            self.events.retired(&self.shared);
        }
        self.settle();
    }

    pub(super) fn on_goaway(&mut self, last_processed: StreamId, code: u32, debug: &[u8]) {
        let outcome = self.goaway.apply(last_processed);
        if outcome.first {
            info!(
                "shutdown notification received: id={}, last_stream_id={last_processed}, \
                 code={code}, debug={:?}",
                self.shared.id(),
                String::from_utf8_lossy(debug)
            );
        } else if outcome.tightened {
            debug!(
                "shutdown watermark lowered: id={}, last_stream_id={}",
                self.shared.id(),
                outcome.watermark
            );
        }
        self.begin_drain("shutdown notification");
        for id in self.streams.ids_above(outcome.watermark) {
            debug_assert!(!self.goaway.permits(id));
            self.fail_stream(
                id,
                RequestError::ShutdownReceived {
                    stream_id: id,
                    last_processed: outcome.watermark,
                },
            );
        }
    }

    /// Record the transition to `Closed` and notify the pool once.
    pub(super) fn mark_closed(&mut self) {
        if let Some(previous) = self.shared.advance(ConnectionState::Closed) {
            if previous == ConnectionState::Active {
                self.events.retired(&self.shared);
            }
            self.events.closed(&self.shared);
        }
    }

    /// Tear the connection down, failing every stream still in flight.
    pub(super) async fn close(mut self, cause: CloseCause) {
        self.mark_closed();
        let streams = self.streams.take_all();
        let failed = streams.len();
        for (id, slot) in streams {
            self.outbound.discard_stream(id);
            let error = cause.error_for(slot.phase());
            metrics::inc_errors(error.kind());
            self.shared.release();
            metrics::dec_streams();
            slot.fail(error);
        }
        if cause.is_graceful() {
            let goodbye = async {
                while self.outbound.has_work() {
                    self.outbound.drive(&mut self.writer).await?;
                }
                if !matches!(cause, CloseCause::Drained) {
                    self.writer
                        .send(Frame::GoAway {
                            last_stream_id: 0,
                            code: 0,
                            debug: Vec::new(),
                        })
                        .await?;
                }
                self.writer.close().await
            };
            match tokio::time::timeout(CLOSE_GRACE, goodbye).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("close write failed: id={}, error={e}", self.shared.id()),
                Err(_) => debug!("close write timed out: id={}", self.shared.id()),
            }
        }
        let message = "connection closed";
        match cause {
            CloseCause::Disconnected | CloseCause::ReadTimeout | CloseCause::HealthCheckFailed(_) => {
                warn!(
                    "{message}: id={}, key={}, cause={cause}, failed_streams={failed}",
                    self.shared.id(),
                    self.shared.key()
                );
            }
            _ => info!(
                "{message}: id={}, key={}, cause={cause}, failed_streams={failed}",
                self.shared.id(),
                self.shared.key()
            ),
        }
    }
}
