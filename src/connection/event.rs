//! Messages consumed by the connection actor.

use std::{fmt, io, time::Duration};

use tokio::sync::oneshot;

use super::{OpenRejected, outbound::Progress};
use crate::{
    error::{ClosePhase, RequestError},
    frame::Frame,
    session::StreamId,
    stream::{Request, StreamHandle},
};

/// Reply to [`Command::Open`].
pub(crate) type OpenReply = oneshot::Sender<Result<StreamHandle, OpenRejected>>;

/// Requests sent to a connection actor by the pool and by stream handles.
#[derive(Debug)]
pub(crate) enum Command {
    /// Open a stream for `request` using capacity already reserved.
    Open { request: Request, reply: OpenReply },
    /// Abandon a stream whose handle was dropped.
    Cancel { stream_id: StreamId },
    /// Close the connection, failing its streams.
    Close,
}

/// Events returned by [`ConnectionActor::next_event`][super::ConnectionActor::next_event].
#[derive(Debug)]
pub(super) enum Event {
    Shutdown,
    Inbound(Option<io::Result<Frame>>),
    Command(Option<Command>),
    Written(io::Result<Option<Progress>>),
    HealthTimer,
    ReadTimeout,
}

/// Why a connection is being torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum CloseCause {
    /// The transport closed or failed.
    Disconnected,
    /// No frame arrived within the read timeout.
    ReadTimeout,
    /// A probe went unacknowledged.
    HealthCheckFailed(Duration),
    /// The dispatcher is closing.
    DispatcherClosed,
    /// Every handle to the connection was dropped.
    ///
    /// This happens when the pool itself is dropped without
    /// [`Dispatcher::close`](crate::Dispatcher::close), so streams still in
    /// flight receive [`RequestError::DispatcherClosed`] as they would from an
    /// explicit close.
    Released,
    /// The connection was closed explicitly through the pool.
    Evicted,
    /// A draining connection finished its last stream.
    Drained,
}

impl CloseCause {
    /// Error delivered to a stream still in flight at `phase`.
    pub(super) const fn error_for(self, phase: ClosePhase) -> RequestError {
        match self {
            Self::ReadTimeout => RequestError::ConnectionClosed {
                phase: ClosePhase::ReadTimeout,
            },
            Self::HealthCheckFailed(timeout) => RequestError::HealthCheckFailed { timeout },
            Self::DispatcherClosed | Self::Released => RequestError::DispatcherClosed,
            Self::Disconnected | Self::Evicted | Self::Drained => {
                RequestError::ConnectionClosed { phase }
            }
        }
    }

    /// Whether the peer is still expected to read what we send.
    pub(super) const fn is_graceful(self) -> bool {
        matches!(
            self,
            Self::DispatcherClosed | Self::Released | Self::Evicted | Self::Drained
        )
    }
}

impl fmt::Display for CloseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::ReadTimeout => "read_timeout",
            Self::HealthCheckFailed(_) => "health_check_failed",
            Self::DispatcherClosed => "dispatcher_closed",
            Self::Released => "released",
            Self::Evicted => "evicted",
            Self::Drained => "drained",
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::error::ErrorKind;

    #[rstest]
    #[case(CloseCause::Disconnected, ErrorKind::ConnectionClosed)]
    #[case(CloseCause::ReadTimeout, ErrorKind::ConnectionClosed)]
    #[case(CloseCause::HealthCheckFailed(Duration::from_secs(1)), ErrorKind::HealthCheckFailed)]
    #[case(CloseCause::DispatcherClosed, ErrorKind::DispatcherClosed)]
    #[case(CloseCause::Released, ErrorKind::DispatcherClosed)]
    #[case(CloseCause::Evicted, ErrorKind::ConnectionClosed)]
    fn causes_map_to_error_kinds(#[case] cause: CloseCause, #[case] kind: ErrorKind) {
        assert_eq!(
            cause.error_for(ClosePhase::AwaitingResponseHeaders).kind(),
            kind
        );
    }

    #[test]
    fn read_timeout_overrides_the_stream_phase() {
        let error = CloseCause::ReadTimeout.error_for(ClosePhase::DuringResponsePayload);
        assert_eq!(error.close_phase(), Some(ClosePhase::ReadTimeout));
    }

    #[test]
    fn disconnect_keeps_the_stream_phase() {
        let error = CloseCause::Disconnected.error_for(ClosePhase::DuringResponsePayload);
        assert_eq!(error.close_phase(), Some(ClosePhase::DuringResponsePayload));
    }
}
