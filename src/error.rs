//! Error taxonomy surfaced to callers.
//!
//! Every failure of a request is classified into exactly one [`ErrorKind`].
//! Connection-closed failures additionally carry the [`ClosePhase`] the stream
//! had reached, because the same low-level symptom (the socket went away) means
//! very different things depending on how far the exchange had progressed.

use std::{fmt, io, time::Duration};

use thiserror::Error;

use crate::{destination::PoolKey, session::StreamId};

/// How far a stream had progressed when its connection closed.
///
/// Variants are ordered by progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClosePhase {
    /// No byte of the request had been written.
    BeforeRequestSent,
    /// The request header block was written but the payload was incomplete.
    DuringRequestPayload,
    /// The request was fully written; no response headers had arrived.
    AwaitingResponseHeaders,
    /// Response headers arrived but no payload had.
    AfterResponseHeaders,
    /// Part of the response payload had arrived.
    DuringResponsePayload,
    /// No data was observed on the connection for the configured read timeout.
    ReadTimeout,
}

impl ClosePhase {
    /// Short machine-friendly label, used for metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeRequestSent => "before_request_sent",
            Self::DuringRequestPayload => "during_request_payload",
            Self::AwaitingResponseHeaders => "awaiting_response_headers",
            Self::AfterResponseHeaders => "after_response_headers",
            Self::DuringResponsePayload => "during_response_payload",
            Self::ReadTimeout => "read_timeout",
        }
    }
}

impl fmt::Display for ClosePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::BeforeRequestSent => "before the request was sent",
            Self::DuringRequestPayload => "while the request payload was being sent",
            Self::AwaitingResponseHeaders => {
                "after the request was sent but before response headers were received"
            }
            Self::AfterResponseHeaders => {
                "after response headers were received but before the response payload"
            }
            Self::DuringResponsePayload => "while the response payload was being received",
            Self::ReadTimeout => "after timing out waiting for data from the peer",
        };
        f.write_str(text)
    }
}

/// Coarse classification of a [`RequestError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A new connection could not be established.
    Connect,
    /// The peer announced shutdown and will not process the stream.
    ShutdownReceived,
    /// The peer did not answer a liveness probe in time.
    HealthCheckFailed,
    /// The connection closed while the stream was in flight.
    ConnectionClosed,
    /// The peer reset the stream.
    StreamReset,
    /// The per-request timeout elapsed.
    Timeout,
    /// The dispatcher was closed.
    DispatcherClosed,
}

impl ErrorKind {
    /// Short machine-friendly label, used for metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::ShutdownReceived => "shutdown_received",
            Self::HealthCheckFailed => "health_check_failed",
            Self::ConnectionClosed => "connection_closed",
            Self::StreamReset => "stream_reset",
            Self::Timeout => "timeout",
            Self::DispatcherClosed => "dispatcher_closed",
        }
    }
}

/// Errors raised while establishing a connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The connector or the handshake hit an I/O error.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// Connecting and handshaking took longer than the connect timeout.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),
    /// The peer answered the handshake with something other than settings.
    #[error("handshake failed: {0}")]
    Handshake(String),
    /// The peer closed the transport during the handshake.
    #[error("connection closed during handshake")]
    Closed,
}

/// Terminal failure of one request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// No connection to the destination could be established.
    #[error("failed to establish a connection to {key}: {source}")]
    Connect {
        /// Pool key the connection was created for.
        key: PoolKey,
        /// Underlying cause.
        #[source]
        source: ConnectError,
    },
    /// The stream lay above the watermark of a shutdown notification.
    #[error(
        "shutdown notification received from the peer: stream {stream_id} is above the last \
         processed stream {last_processed} and was not processed"
    )]
    ShutdownReceived {
        /// Stream that was refused.
        stream_id: StreamId,
        /// Effective watermark of the connection.
        last_processed: StreamId,
    },
    /// The connection failed its liveness probe.
    #[error("health check failed: the peer did not acknowledge a ping within {timeout:?}")]
    HealthCheckFailed {
        /// Probe deadline that elapsed.
        timeout: Duration,
    },
    /// The connection closed while the stream was in flight.
    #[error("connection closed {phase}")]
    ConnectionClosed {
        /// How far the stream had progressed.
        phase: ClosePhase,
    },
    /// The peer reset the stream.
    #[error("stream {stream_id} reset by the peer with code {code}")]
    StreamReset {
        /// Stream that was reset.
        stream_id: StreamId,
        /// Reset code sent by the peer.
        code: u32,
    },
    /// The request did not complete within its timeout.
    #[error("request timed out after {after:?}")]
    Timeout {
        /// Configured request timeout.
        after: Duration,
    },
    /// The dispatcher was closed before the request completed.
    #[error("dispatcher closed before the request completed")]
    DispatcherClosed,
}

impl RequestError {
    /// Classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect { .. } => ErrorKind::Connect,
            Self::ShutdownReceived { .. } => ErrorKind::ShutdownReceived,
            Self::HealthCheckFailed { .. } => ErrorKind::HealthCheckFailed,
            Self::ConnectionClosed { .. } => ErrorKind::ConnectionClosed,
            Self::StreamReset { .. } => ErrorKind::StreamReset,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::DispatcherClosed => ErrorKind::DispatcherClosed,
        }
    }

    /// Phase of a connection-closed failure.
    #[must_use]
    pub const fn close_phase(&self) -> Option<ClosePhase> {
        match self {
            Self::ConnectionClosed { phase } => Some(*phase),
            _ => None,
        }
    }
}

/// Errors returned when building a dispatcher from invalid settings.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// At least one connection per destination is required.
    #[error("invalid connection limit {0}; must be >= 1")]
    InvalidConnectionLimit(usize),
    /// At least one concurrent stream per connection is required.
    #[error("invalid stream limit {0}; must be >= 1")]
    InvalidStreamLimit(u32),
    /// A configured duration of zero would fire immediately.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ClosePhase::BeforeRequestSent, "connection closed before the request was sent")]
    #[case(
        ClosePhase::DuringResponsePayload,
        "connection closed while the response payload was being received"
    )]
    #[case(
        ClosePhase::ReadTimeout,
        "connection closed after timing out waiting for data from the peer"
    )]
    fn closed_messages_name_the_phase(#[case] phase: ClosePhase, #[case] expected: &str) {
        let error = RequestError::ConnectionClosed { phase };
        assert_eq!(error.to_string(), expected);
        assert_eq!(error.close_phase(), Some(phase));
    }

    #[test]
    fn shutdown_message_mentions_the_peer() {
        let error = RequestError::ShutdownReceived {
            stream_id: StreamId::new(3),
            last_processed: StreamId::new(1),
        };
        assert!(error.to_string().starts_with("shutdown notification received from the peer"));
        assert_eq!(error.kind(), ErrorKind::ShutdownReceived);
        assert_eq!(error.close_phase(), None);
    }
}
