//! Scripted server side of a pooled connection.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use muxpool::{
    Destination,
    frame::{Frame, FrameCodec},
};
use tokio::{io::DuplexStream, time::Instant};
use tokio_util::codec::Framed;

/// Request reassembled from the frames a client sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedRequest {
    /// Stream the request was sent on.
    pub stream_id: u32,
    /// Opaque header block.
    pub head: Vec<u8>,
    /// Concatenated body chunks.
    pub body: Vec<u8>,
}

/// Server half of a connection, driven step by step by a test.
///
/// Reading helpers answer client pings automatically unless
/// [`set_auto_ack`](Self::set_auto_ack) switches that off. Every frame read is
/// also kept in a log for later assertions.
pub struct PeerConnection {
    framed: Framed<DuplexStream, FrameCodec>,
    destination: Destination,
    auto_ack: bool,
    seen: Vec<Frame>,
}

impl PeerConnection {
    pub(crate) fn new(io: DuplexStream, destination: Destination) -> Self {
        Self {
            framed: Framed::new(io, FrameCodec::default()),
            destination,
            auto_ack: true,
            seen: Vec::new(),
        }
    }

    /// Destination the client connected to.
    #[must_use]
    pub fn destination(&self) -> &Destination { &self.destination }

    /// Enable or disable automatic ping acknowledgements.
    pub fn set_auto_ack(&mut self, enabled: bool) { self.auto_ack = enabled; }

    /// Frames read so far, in arrival order.
    #[must_use]
    pub fn seen(&self) -> &[Frame] { &self.seen }

    /// Number of pings read so far.
    #[must_use]
    pub fn pings_seen(&self) -> usize {
        self.seen
            .iter()
            .filter(|frame| matches!(frame, Frame::Ping { .. }))
            .count()
    }

    /// Read the client's settings and answer with ours.
    ///
    /// # Panics
    ///
    /// Panics if the first frame is not a settings frame.
    pub async fn handshake(&mut self, max_concurrent_streams: Option<u32>) {
        match self.next_frame().await {
            Some(Frame::Settings { .. }) => {}
            other => panic!("expected client settings, got {other:?}"),
        }
        self.send(Frame::Settings {
            max_concurrent_streams,
        })
        .await;
    }

    /// Read the next frame, answering pings when auto-ack is on.
    ///
    /// Returns `None` once the client closed the connection.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        let frame = self.framed.next().await?.ok()?;
        self.seen.push(frame.clone());
        if let Frame::Ping { token } = frame {
            if self.auto_ack {
                let _ = self.framed.send(Frame::PingAck { token }).await;
            }
        }
        Some(frame)
    }

    /// Read frames until a complete request has arrived.
    ///
    /// Pings, settings and shutdown frames from the client are skipped.
    ///
    /// # Panics
    ///
    /// Panics if the client closes the connection first.
    pub async fn read_request(&mut self) -> ReceivedRequest {
        let mut pending: Option<ReceivedRequest> = None;
        loop {
            let frame = self
                .next_frame()
                .await
                .expect("connection closed before a request arrived");
            match frame {
                Frame::Headers {
                    stream_id,
                    block,
                    end_stream,
                } => {
                    let request = ReceivedRequest {
                        stream_id,
                        head: block,
                        body: Vec::new(),
                    };
                    if end_stream {
                        return request;
                    }
                    pending = Some(request);
                }
                Frame::Data {
                    stream_id,
                    payload,
                    end_stream,
                } => {
                    let request = pending
                        .as_mut()
                        .filter(|request| request.stream_id == stream_id)
                        .expect("data for a stream without headers");
                    request.body.extend_from_slice(&payload);
                    if end_stream {
                        return pending.take().expect("pending request");
                    }
                }
                _ => {}
            }
        }
    }

    /// Read frames until the client closes the connection.
    ///
    /// Returns the frames read during this call.
    pub async fn read_until_closed(&mut self) -> Vec<Frame> {
        let start = self.seen.len();
        while self.next_frame().await.is_some() {}
        self.seen[start..].to_vec()
    }

    /// Read frames for `duration`, answering pings when auto-ack is on.
    ///
    /// Returns `false` if the client closed the connection meanwhile.
    pub async fn serve_for(&mut self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            match tokio::time::timeout_at(deadline, self.next_frame()).await {
                Err(_) => return true,
                Ok(None) => return false,
                Ok(Some(_)) => {}
            }
        }
    }

    /// Send a frame.
    ///
    /// Write errors are ignored: a test that cares whether the client is still
    /// there reads from the connection instead.
    pub async fn send(&mut self, frame: Frame) { let _ = self.framed.send(frame).await; }

    /// Send a complete response on `stream_id`.
    pub async fn respond(&mut self, stream_id: u32, head: &[u8], body: &[u8]) {
        self.send_headers(stream_id, head, body.is_empty()).await;
        if !body.is_empty() {
            self.send_data(stream_id, body, true).await;
        }
    }

    /// Send a response header block.
    pub async fn send_headers(&mut self, stream_id: u32, head: &[u8], end_stream: bool) {
        self.send(Frame::Headers {
            stream_id,
            block: head.to_vec(),
            end_stream,
        })
        .await;
    }

    /// Send a response payload chunk.
    pub async fn send_data(&mut self, stream_id: u32, payload: &[u8], end_stream: bool) {
        self.send(Frame::Data {
            stream_id,
            payload: payload.to_vec(),
            end_stream,
        })
        .await;
    }

    /// Announce shutdown with `last_stream_id` as the watermark.
    pub async fn go_away(&mut self, last_stream_id: u32) {
        self.send(Frame::GoAway {
            last_stream_id,
            code: 0,
            debug: b"graceful shutdown".to_vec(),
        })
        .await;
    }

    /// Reset `stream_id` with `code`.
    pub async fn reset(&mut self, stream_id: u32, code: u32) {
        self.send(Frame::Reset { stream_id, code }).await;
    }
}
