//! Log records emitted over a connection's life.

use std::time::Duration;

use muxpool::Request;
use muxpool_testing::{DuplexConnector, LoggerHandle, local_destination, logger, quiet_builder};
use rstest::rstest;
use serial_test::serial;

fn find<'a>(messages: &'a [String], needle: &str) -> Option<&'a String> {
    messages.iter().find(|message| message.contains(needle))
}

#[rstest]
#[serial]
#[tokio::test]
async fn drain_and_close_are_logged(mut logger: LoggerHandle) {
    let (connector, mut listener) = DuplexConnector::new();
    let dispatcher = quiet_builder().build(connector).expect("valid configuration");

    let (handle, mut peer) = tokio::join!(
        dispatcher.start(Request::new(local_destination(), "GET /")),
        listener.accept_handshaken(None)
    );
    let handle = handle.expect("stream opens");
    let received = peer.read_request().await;
    peer.go_away(received.stream_id).await;
    peer.respond(received.stream_id, b"200", b"").await;
    handle.response().await.expect("stream is processed");
    dispatcher.close().await;

    let messages = logger.messages();
    assert!(find(&messages, "connection created: id=ConnectionId(1)").is_some());
    let notice = find(&messages, "shutdown notification received")
        .expect("shutdown notification logged");
    assert!(notice.contains("last_stream_id=1"));
    assert!(notice.contains("graceful shutdown"));
    assert!(find(&messages, "reason=shutdown notification").is_some());
    let closed = find(&messages, "connection closed:").expect("close logged");
    assert!(closed.contains("cause=drained"));
    assert!(closed.contains("failed_streams=0"));
}

#[rstest]
#[serial]
#[tokio::test(start_paused = true)]
async fn health_failure_is_logged_as_a_warning(mut logger: LoggerHandle) {
    let (connector, mut listener) = DuplexConnector::new();
    let dispatcher = quiet_builder()
        .health_check_period(Some(Duration::from_millis(100)))
        .health_check_timeout(Some(Duration::from_millis(50)))
        .build(connector)
        .expect("valid configuration");

    let peer = async {
        let mut peer = listener.accept_handshaken(None).await;
        peer.set_auto_ack(false);
        peer.read_request().await;
        peer.read_until_closed().await;
    };
    let (outcome, ()) = tokio::join!(
        dispatcher.execute(Request::new(local_destination(), "GET /")),
        peer
    );
    assert!(outcome.is_err());

    let mut warnings = Vec::new();
    while let Some(record) = logger.pop() {
        if record.level() == log::Level::Warn {
            warnings.push(record.args().to_owned());
        }
    }
    assert!(find(&warnings, "health check failed").is_some());
    let closed = find(&warnings, "connection closed:").expect("close logged");
    assert!(closed.contains("cause=health_check_failed"));
    assert!(closed.contains("failed_streams=1"));
}
