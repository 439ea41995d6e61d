//! Outbound frame queue for the connection actor.
//!
//! The actor never awaits a write inline. Frames are queued and the queue is
//! drained by one branch of the actor's `select!`, so a peer that stops reading
//! stalls only that branch while timers, inbound frames and shutdown are still
//! observed. Draining is cancel-safe: a frame leaves the queue only once the
//! sink has accepted it.

use std::{
    collections::VecDeque,
    future::poll_fn,
    io,
    task::{Context, Poll, ready},
};

use futures::{Sink, SinkExt};

use crate::{error::ClosePhase, frame::Frame, session::StreamId};

/// Stream progress confirmed once a tracked frame has been flushed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Progress {
    pub(super) stream_id: StreamId,
    pub(super) phase: ClosePhase,
}

#[derive(Debug)]
struct Queued {
    frame: Frame,
    progress: Option<Progress>,
}

/// Frames waiting to be written, in order.
#[derive(Debug, Default)]
pub(super) struct Outbound {
    queue: VecDeque<Queued>,
    unflushed: Option<Progress>,
    dirty: bool,
}

impl Outbound {
    pub(super) fn push(&mut self, frame: Frame) {
        self.queue.push_back(Queued {
            frame,
            progress: None,
        });
    }

    /// Queue `frame` and report `phase` for `stream_id` once it is flushed.
    pub(super) fn push_tracked(&mut self, frame: Frame, stream_id: StreamId, phase: ClosePhase) {
        self.queue.push_back(Queued {
            frame,
            progress: Some(Progress { stream_id, phase }),
        });
    }

    /// Whether frames are queued or written but not yet flushed.
    pub(super) fn has_work(&self) -> bool { self.dirty || !self.queue.is_empty() }

    /// Drop the queued frames of `stream_id`.
    ///
    /// Returns `true` when none of the stream's frames had reached the sink,
    /// so the peer never learned of the stream.
    pub(super) fn discard_stream(&mut self, stream_id: StreamId) -> bool {
        let id = stream_id.as_u32();
        let mut unsent = false;
        self.queue.retain(|queued| {
            if queued.frame.stream_id() != Some(id) {
                return true;
            }
            unsent |= matches!(queued.frame, Frame::Headers { .. });
            false
        });
        unsent
    }

    /// Write queued frames into `sink`.
    ///
    /// Resolves after each flush that confirms tracked progress, after the
    /// queue has been fully flushed, or when the sink fails.
    pub(super) async fn drive<S>(&mut self, sink: &mut S) -> io::Result<Option<Progress>>
    where
        S: Sink<Frame, Error = io::Error> + Unpin,
    {
        poll_fn(|cx| self.poll_drive(sink, cx)).await
    }

    fn poll_drive<S>(&mut self, sink: &mut S, cx: &mut Context<'_>) -> Poll<io::Result<Option<Progress>>>
    where
        S: Sink<Frame, Error = io::Error> + Unpin,
    {
        loop {
            if self.dirty && (self.unflushed.is_some() || self.queue.is_empty()) {
                ready!(sink.poll_flush_unpin(cx))?;
                self.dirty = false;
                return Poll::Ready(Ok(self.unflushed.take()));
            }
            if self.queue.is_empty() {
                return Poll::Ready(Ok(None));
            }
            ready!(sink.poll_ready_unpin(cx))?;
            let Some(queued) = self.queue.pop_front() else {
                return Poll::Ready(Ok(None));
            };
            sink.start_send_unpin(queued.frame)?;
            self.dirty = true;
            self.unflushed = queued.progress;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;

    use rstest::{fixture, rstest};

    use super::*;

    /// Sink that records frames and refuses to flush until released.
    #[derive(Default)]
    struct GatedSink {
        accepted: Vec<Frame>,
        flushed: usize,
        open: bool,
    }

    impl Sink<Frame> for GatedSink {
        type Error = io::Error;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(mut self: Pin<&mut Self>, frame: Frame) -> io::Result<()> {
            self.accepted.push(frame);
            Ok(())
        }

        fn poll_flush(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            if self.open {
                self.flushed = self.accepted.len();
                Poll::Ready(Ok(()))
            } else {
                Poll::Pending
            }
        }

        fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.poll_flush(cx)
        }
    }

    fn headers(stream_id: u32) -> Frame {
        Frame::Headers {
            stream_id,
            block: b"GET /".to_vec(),
            end_stream: false,
        }
    }

    fn data(stream_id: u32) -> Frame {
        Frame::Data {
            stream_id,
            payload: vec![0; 8],
            end_stream: true,
        }
    }

    #[fixture]
    fn outbound() -> Outbound { Outbound::default() }

    #[rstest]
    fn progress_waits_for_the_flush(mut outbound: Outbound) {
        let id = StreamId::new(1);
        outbound.push_tracked(headers(1), id, ClosePhase::DuringRequestPayload);
        outbound.push(data(1));
        let mut sink = GatedSink::default();
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);

        assert!(outbound.poll_drive(&mut sink, &mut cx).is_pending());
        assert_eq!(sink.accepted.len(), 1, "nothing follows an unflushed tracked frame");

        sink.open = true;
        assert!(matches!(
            outbound.poll_drive(&mut sink, &mut cx),
            Poll::Ready(Ok(Some(Progress { phase: ClosePhase::DuringRequestPayload, .. })))
        ));
        assert!(matches!(
            outbound.poll_drive(&mut sink, &mut cx),
            Poll::Ready(Ok(None))
        ));
        assert_eq!(sink.flushed, 2);
        assert!(!outbound.has_work());
    }

    #[rstest]
    fn discarding_an_unsent_stream_reports_it(mut outbound: Outbound) {
        outbound.push(headers(1));
        outbound.push(headers(3));
        outbound.push(data(3));

        assert!(outbound.discard_stream(StreamId::new(3)));
        assert_eq!(outbound.queue.len(), 1);
    }

    #[rstest]
    fn discarding_a_started_stream_keeps_other_frames(mut outbound: Outbound) {
        outbound.push(data(1));
        outbound.push(Frame::Ping { token: 7 });

        assert!(!outbound.discard_stream(StreamId::new(1)));
        assert!(matches!(
            outbound.queue.front().map(|queued| &queued.frame),
            Some(Frame::Ping { token: 7 })
        ));
    }
}
