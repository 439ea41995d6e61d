//! Per-request timeout applied by `execute`.

use std::time::Duration;

use muxpool::{ErrorKind, Request, RequestError, frame::{Frame, RESET_CANCEL}};
use muxpool_testing::{DuplexConnector, TestResult, local_destination, quiet_builder};
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_millis(500);

#[tokio::test(start_paused = true)]
async fn timeout_wins_over_a_draining_connection() -> TestResult {
    let (connector, mut listener) = DuplexConnector::new();
    let dispatcher = quiet_builder().request_timeout(Some(TIMEOUT)).build(connector)?;
    let destination = local_destination();
    let started = Instant::now();

    let peer = async {
        let mut peer = listener.accept_handshaken(None).await;
        let received = peer.read_request().await;
        peer.go_away(received.stream_id).await;
        let reset = loop {
            match peer.next_frame().await {
                Some(frame @ Frame::Reset { .. }) => break Some(frame),
                Some(_) => {}
                None => break None,
            }
        };
        let trailing = peer.read_until_closed().await;
        (received.stream_id, reset, trailing)
    };
    let (outcome, (stream_id, reset, trailing)) = tokio::join!(
        dispatcher.execute(Request::new(destination.clone(), "GET /slow")),
        peer
    );

    let error = outcome.expect_err("the peer never answers");
    assert!(matches!(error, RequestError::Timeout { after } if after == TIMEOUT));
    assert_eq!(error.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() >= TIMEOUT);
    assert_eq!(
        reset,
        Some(Frame::Reset {
            stream_id,
            code: RESET_CANCEL,
        })
    );
    assert!(trailing.is_empty(), "drained close sends nothing more");
    let stats = dispatcher.stats(&destination);
    assert_eq!(stats.live_connections, 0);
    assert_eq!(stats.in_flight_streams, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fast_responses_are_unaffected() -> TestResult {
    let (connector, mut listener) = DuplexConnector::new();
    let dispatcher = quiet_builder().request_timeout(Some(TIMEOUT)).build(connector)?;

    let peer = async {
        let mut peer = listener.accept_handshaken(None).await;
        let received = peer.read_request().await;
        tokio::time::sleep(TIMEOUT / 2).await;
        peer.respond(received.stream_id, b"200", b"in time").await;
    };
    let (outcome, ()) = tokio::join!(
        dispatcher.execute(Request::new(local_destination(), "GET /")),
        peer
    );

    assert_eq!(outcome?.body().as_ref(), b"in time");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn start_is_not_bounded_by_the_request_timeout() -> TestResult {
    let (connector, mut listener) = DuplexConnector::new();
    let dispatcher = quiet_builder().request_timeout(Some(TIMEOUT)).build(connector)?;

    let (handle, mut peer) = tokio::join!(
        dispatcher.start(Request::new(local_destination(), "GET /")),
        listener.accept_handshaken(None)
    );
    let handle = handle?;
    let received = peer.read_request().await;
    tokio::time::sleep(TIMEOUT * 2).await;
    peer.respond(received.stream_id, b"200", b"late").await;

    assert_eq!(handle.response().await?.body().as_ref(), b"late");
    Ok(())
}
