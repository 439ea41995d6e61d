//! Frame vocabulary exchanged with the peer and the codec that carries it.
//!
//! Frames are bincode-encoded (standard configuration) and wrapped in a
//! length-delimited envelope. The pool does not look inside header blocks or
//! payloads; it only reacts to frame types and stream identifiers.

use std::io;

use bincode::{Decode, Encode, config, decode_from_slice, encode_to_vec};
use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

const MIN_FRAME_LENGTH: usize = 64;
const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;
const DEFAULT_MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Reset code sent when the client abandons a stream.
pub const RESET_CANCEL: u32 = 0x8;

/// One protocol frame.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum Frame {
    /// Connection settings. Opens the handshake in both directions.
    Settings {
        /// Cap on concurrent streams the sender will accept.
        max_concurrent_streams: Option<u32>,
    },
    /// Opaque header block opening a request or a response.
    Headers {
        /// Stream the block belongs to.
        stream_id: u32,
        /// Encoded header block.
        block: Vec<u8>,
        /// Whether no payload follows.
        end_stream: bool,
    },
    /// Payload chunk.
    Data {
        /// Stream the chunk belongs to.
        stream_id: u32,
        /// Chunk bytes.
        payload: Vec<u8>,
        /// Whether this is the final chunk.
        end_stream: bool,
    },
    /// Abort a single stream.
    Reset {
        /// Stream being aborted.
        stream_id: u32,
        /// Reason code.
        code: u32,
    },
    /// Liveness probe.
    Ping {
        /// Correlation token echoed by the acknowledgement.
        token: u64,
    },
    /// Liveness probe acknowledgement.
    PingAck {
        /// Token of the probe being acknowledged.
        token: u64,
    },
    /// Shutdown notification.
    GoAway {
        /// Highest stream the sender has processed or will process.
        last_stream_id: u32,
        /// Reason code.
        code: u32,
        /// Free-form diagnostic bytes.
        debug: Vec<u8>,
    },
}

impl Frame {
    /// Frame type name used in logs and errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Settings { .. } => "settings",
            Self::Headers { .. } => "headers",
            Self::Data { .. } => "data",
            Self::Reset { .. } => "reset",
            Self::Ping { .. } => "ping",
            Self::PingAck { .. } => "ping_ack",
            Self::GoAway { .. } => "goaway",
        }
    }

    /// Stream the frame addresses, for stream-scoped frames.
    #[must_use]
    pub const fn stream_id(&self) -> Option<u32> {
        match self {
            Self::Headers { stream_id, .. }
            | Self::Data { stream_id, .. }
            | Self::Reset { stream_id, .. } => Some(*stream_id),
            Self::Settings { .. } | Self::Ping { .. } | Self::PingAck { .. } | Self::GoAway { .. } => {
                None
            }
        }
    }
}

/// Codec configuration for pooled connections.
///
/// # Examples
///
/// ```
/// use muxpool::frame::CodecConfig;
///
/// let codec = CodecConfig::default().max_frame_length(2048);
/// assert_eq!(codec.max_frame_length_value(), 2048);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecConfig {
    max_frame_length: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl CodecConfig {
    /// Set the maximum encoded frame length.
    ///
    /// The value is clamped between 64 bytes and 16 MiB.
    #[must_use]
    pub fn max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH);
        self
    }

    /// Return the configured maximum frame length.
    #[must_use]
    pub const fn max_frame_length_value(&self) -> usize { self.max_frame_length }

    /// Build a codec using these settings.
    #[must_use]
    pub fn build_codec(&self) -> FrameCodec {
        let inner = LengthDelimitedCodec::builder()
            .max_frame_length(self.max_frame_length)
            .new_codec();
        FrameCodec { inner }
    }
}

/// Length-delimited bincode codec for [`Frame`]s.
#[derive(Debug)]
pub struct FrameCodec {
    inner: LengthDelimitedCodec,
}

impl Default for FrameCodec {
    fn default() -> Self { CodecConfig::default().build_codec() }
}

impl Encoder<Frame> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = encode_to_vec(&frame, config::standard())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.inner.encode(Bytes::from(bytes), dst)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(bytes) = self.inner.decode(src)? else {
            return Ok(None);
        };
        let (frame, _consumed) = decode_from_slice(&bytes, config::standard())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(frame))
    }
}
