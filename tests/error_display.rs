//! Tests for Display implementations on error types.

use std::{error::Error as _, io, time::Duration};

use muxpool::{
    ClosePhase,
    ConfigError,
    ConnectError,
    Destination,
    PoolKey,
    Protocol,
    RequestError,
    Scheme,
    StreamId,
};
use rstest::rstest;

#[rstest]
#[case(ClosePhase::BeforeRequestSent, "connection closed before the request was sent")]
#[case(
    ClosePhase::DuringRequestPayload,
    "connection closed while the request payload was being sent"
)]
#[case(
    ClosePhase::AwaitingResponseHeaders,
    "connection closed after the request was sent but before response headers were received"
)]
#[case(
    ClosePhase::AfterResponseHeaders,
    "connection closed after response headers were received but before the response payload"
)]
#[case(
    ClosePhase::DuringResponsePayload,
    "connection closed while the response payload was being received"
)]
#[case(
    ClosePhase::ReadTimeout,
    "connection closed after timing out waiting for data from the peer"
)]
fn connection_closed_names_every_phase(#[case] phase: ClosePhase, #[case] expected: &str) {
    assert_eq!(RequestError::ConnectionClosed { phase }.to_string(), expected);
}

#[test]
fn shutdown_received_names_both_streams() {
    let error = RequestError::ShutdownReceived {
        stream_id: StreamId::new(5),
        last_processed: StreamId::new(3),
    };
    let message = error.to_string();
    assert!(message.starts_with("shutdown notification received from the peer"));
    assert!(message.contains("stream 5"));
    assert!(message.contains("last processed stream 3"));
}

#[test]
fn health_check_failure_names_the_timeout() {
    let error = RequestError::HealthCheckFailed {
        timeout: Duration::from_millis(50),
    };
    assert_eq!(
        error.to_string(),
        "health check failed: the peer did not acknowledge a ping within 50ms"
    );
}

#[test]
fn connect_errors_keep_their_source() {
    let key = PoolKey::new(
        Destination::new(Scheme::Https, "example.com", 443),
        Protocol::Http2,
    );
    let error = RequestError::Connect {
        key,
        source: ConnectError::Io(io::Error::other("refused")),
    };
    assert_eq!(
        error.to_string(),
        "failed to establish a connection to https://example.com:443 (h2): transport error: \
         refused"
    );
    let source = error.source().expect("connect errors carry a source");
    assert_eq!(source.to_string(), "transport error: refused");
}

#[rstest]
#[case(ConnectError::Timeout(Duration::from_secs(2)), "connection attempt timed out after 2s")]
#[case(
    ConnectError::Handshake("expected settings, received data".into()),
    "handshake failed: expected settings, received data"
)]
#[case(ConnectError::Closed, "connection closed during handshake")]
fn connect_error_messages(#[case] error: ConnectError, #[case] expected: &str) {
    assert_eq!(error.to_string(), expected);
}

#[test]
fn config_error_messages() {
    assert_eq!(
        ConfigError::InvalidConnectionLimit(0).to_string(),
        "invalid connection limit 0; must be >= 1"
    );
    assert_eq!(
        ConfigError::ZeroDuration("read timeout").to_string(),
        "read timeout must be greater than zero"
    );
}
