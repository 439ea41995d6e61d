//! Event dispatching for the connection actor.

use log::{debug, warn};
use tokio::time::Instant;

use super::{
    ConnectionActor,
    ConnectionState,
    event::{CloseCause, Command, Event, OpenReply},
    health::HealthAction,
};
use crate::{
    error::{ClosePhase, RequestError},
    frame::{Frame, RESET_CANCEL},
    metrics,
    session::StreamId,
    stream::{Request, StreamHandle},
    transport::TransportStream,
};

impl<Io: TransportStream> ConnectionActor<Io> {
    /// Handle one event. Returns the cause when the connection must close.
    pub(super) fn dispatch_event(&mut self, event: Event) -> Option<CloseCause> {
        match event {
            Event::Shutdown => Some(CloseCause::DispatcherClosed),
            Event::Inbound(Some(Ok(frame))) => {
                self.last_read = Instant::now();
                self.handle_frame(frame)
            }
            Event::Inbound(Some(Err(e))) => {
                warn!(
                    "connection read failed: id={}, error={e}",
                    self.shared.id()
                );
                Some(CloseCause::Disconnected)
            }
            Event::Inbound(None) => Some(CloseCause::Disconnected),
            Event::Command(Some(command)) => self.handle_command(command),
            Event::Command(None) => Some(CloseCause::Released),
            Event::Written(Ok(progress)) => {
                if let Some(progress) = progress {
                    self.advance_stream(progress.stream_id, progress.phase);
                }
                None
            }
            Event::Written(Err(e)) => {
                warn!("connection write failed: id={}, error={e}", self.shared.id());
                Some(CloseCause::Disconnected)
            }
            Event::HealthTimer => self.on_health_timer(),
            Event::ReadTimeout => {
                warn!(
                    "read timeout elapsed: id={}, timeout={:?}, active_streams={}",
                    self.shared.id(),
                    self.read_timeout,
                    self.streams.len()
                );
                Some(CloseCause::ReadTimeout)
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame) -> Option<CloseCause> {
        match frame {
            Frame::Settings {
                max_concurrent_streams,
            } => {
                if let Some(limit) = max_concurrent_streams {
                    self.shared.set_capacity(limit.clamp(1, self.max_streams));
                    self.events.capacity_released(&self.shared);
                }
                None
            }
            Frame::Headers {
                stream_id,
                block,
                end_stream,
            } => {
                let id = StreamId::new(stream_id);
                match self.streams.get_mut(id) {
                    Some(slot) => slot.on_headers(block),
                    None => {
                        debug!("headers for unknown stream ignored: id={}, stream_id={id}", self.shared.id());
                        return None;
                    }
                }
                if end_stream {
                    self.finish_stream(id);
                }
                None
            }
            Frame::Data {
                stream_id,
                payload,
                end_stream,
            } => {
                let id = StreamId::new(stream_id);
                match self.streams.get_mut(id) {
                    Some(slot) => slot.on_data(&payload),
                    None => {
                        debug!("data for unknown stream ignored: id={}, stream_id={id}", self.shared.id());
                        return None;
                    }
                }
                if end_stream {
                    self.finish_stream(id);
                }
                None
            }
            Frame::Reset { stream_id, code } => {
                let id = StreamId::new(stream_id);
                self.fail_stream(id, RequestError::StreamReset { stream_id: id, code });
                None
            }
            Frame::Ping { token } => {
                self.outbound.push(Frame::PingAck { token });
                None
            }
            Frame::PingAck { token } => {
                if !self.health.on_ack(token, Instant::now()) {
                    debug!("stale ping ack ignored: id={}, token={token}", self.shared.id());
                }
                None
            }
            Frame::GoAway {
                last_stream_id,
                code,
                debug,
            } => {
                self.on_goaway(StreamId::new(last_stream_id), code, &debug);
                None
            }
        }
    }

    fn handle_command(&mut self, command: Command) -> Option<CloseCause> {
        match command {
            Command::Open { request, reply } => {
                self.open_stream(&request, reply);
                None
            }
            Command::Cancel { stream_id } => {
                if self.streams.remove(stream_id).is_none() {
                    return None;
                }
                debug!(
                    "stream cancelled: id={}, stream_id={stream_id}",
                    self.shared.id()
                );
                self.release_slot();
                if !self.outbound.discard_stream(stream_id) {
                    self.outbound.push(Frame::Reset {
                        stream_id: stream_id.as_u32(),
                        code: RESET_CANCEL,
                    });
                }
                self.settle();
                None
            }
            Command::Close => Some(CloseCause::Evicted),
        }
    }

    fn open_stream(&mut self, request: &Request, reply: OpenReply) {
        if self.shared.state() != ConnectionState::Active {
            self.reject(reply);
            return;
        }
        let (responder, outcome) = tokio::sync::oneshot::channel();
        let Some(stream_id) = self.streams.allocate(responder) else {
            self.reject(reply);
            self.begin_drain("stream identifiers exhausted");
            return;
        };
        metrics::inc_streams();
        let handle = StreamHandle::new(
            stream_id,
            self.shared.id(),
            outcome,
            self.stream_commands.clone(),
        );
        if let Err(Ok(handle)) = reply.send(Ok(handle)) {
            // The caller stopped waiting; nothing was written yet.
            handle.disarm();
            self.streams.remove(stream_id);
            self.release_slot();
            return;
        }
        if !self.streams.has_ids() {
            self.begin_drain("stream identifiers exhausted");
        }
        self.queue_request(stream_id, request);
    }

    /// Queue the frames of `request`. Each phase is recorded once the frame
    /// that completes it has been flushed to the transport.
    fn queue_request(&mut self, stream_id: StreamId, request: &Request) {
        let chunks = request.body();
        let headers = Frame::Headers {
            stream_id: stream_id.as_u32(),
            block: request.head().to_vec(),
            end_stream: chunks.is_empty(),
        };
        let Some((last, leading)) = chunks.split_last() else {
            self.outbound
                .push_tracked(headers, stream_id, ClosePhase::AwaitingResponseHeaders);
            return;
        };
        self.outbound
            .push_tracked(headers, stream_id, ClosePhase::DuringRequestPayload);
        for chunk in leading {
            self.outbound.push(Frame::Data {
                stream_id: stream_id.as_u32(),
                payload: chunk.to_vec(),
                end_stream: false,
            });
        }
        self.outbound.push_tracked(
            Frame::Data {
                stream_id: stream_id.as_u32(),
                payload: last.to_vec(),
                end_stream: true,
            },
            stream_id,
            ClosePhase::AwaitingResponseHeaders,
        );
    }

    fn advance_stream(&mut self, stream_id: StreamId, phase: ClosePhase) {
        if let Some(slot) = self.streams.get_mut(stream_id) {
            slot.advance(phase);
        }
    }

    fn reject(&self, reply: OpenReply) {
        self.shared.release();
        self.events.capacity_released(&self.shared);
        let _ = reply.send(Err(super::OpenRejected(self.shared.id())));
    }

    fn on_health_timer(&mut self) -> Option<CloseCause> {
        match self.health.on_timer(Instant::now()) {
            HealthAction::Idle => None,
            HealthAction::SendProbe(token) => {
                debug!("sending ping: id={}, token={token}", self.shared.id());
                self.outbound.push(Frame::Ping { token });
                None
            }
            HealthAction::Failed(timeout) => {
                warn!(
                    "health check failed: id={}, timeout={timeout:?}, active_streams={}",
                    self.shared.id(),
                    self.streams.len()
                );
                Some(CloseCause::HealthCheckFailed(timeout))
            }
        }
    }
}
