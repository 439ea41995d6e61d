//! Peer closing the transport mid-exchange.

use muxpool::{ClosePhase, ErrorKind, Request, frame::Frame};
use muxpool_testing::{DuplexConnector, PeerConnection, TestResult, local_destination, quiet_builder};
use rstest::rstest;

/// Larger than the in-memory transport can buffer without the peer reading.
const LARGE_BODY: usize = 512 * 1024;

#[derive(Clone, Copy, Debug)]
enum ClosePoint {
    AfterRequest,
    AfterHeaders,
    DuringPayload,
}

async fn play_until(peer: &mut PeerConnection, point: ClosePoint) {
    let request = peer.read_request().await;
    match point {
        ClosePoint::AfterRequest => {}
        ClosePoint::AfterHeaders => peer.send_headers(request.stream_id, b"200", false).await,
        ClosePoint::DuringPayload => {
            peer.send_headers(request.stream_id, b"200", false).await;
            peer.send_data(request.stream_id, b"partial", false).await;
        }
    }
}

#[rstest]
#[case(ClosePoint::AfterRequest, ClosePhase::AwaitingResponseHeaders)]
#[case(ClosePoint::AfterHeaders, ClosePhase::AfterResponseHeaders)]
#[case(ClosePoint::DuringPayload, ClosePhase::DuringResponsePayload)]
#[tokio::test]
async fn closed_transport_reports_the_stream_phase(
    #[case] point: ClosePoint,
    #[case] phase: ClosePhase,
) -> TestResult {
    let (connector, mut listener) = DuplexConnector::new();
    let dispatcher = quiet_builder().build(connector)?;
    let destination = local_destination();

    let peer = async {
        let mut peer = listener.accept_handshaken(None).await;
        play_until(&mut peer, point).await;
        drop(peer);
    };
    let (outcome, ()) = tokio::join!(
        dispatcher.execute(Request::new(destination.clone(), "GET /")),
        peer
    );

    let error = outcome.expect_err("the peer closed the connection");
    assert_eq!(error.kind(), ErrorKind::ConnectionClosed);
    assert_eq!(error.close_phase(), Some(phase));
    assert_eq!(error.to_string(), format!("connection closed {phase}"));
    let stats = dispatcher.stats(&destination);
    assert_eq!(stats.live_connections, 0);
    assert_eq!(stats.in_flight_streams, 0);

    let peer = async {
        let mut peer = listener.accept_handshaken(None).await;
        let request = peer.read_request().await;
        assert_eq!(request.stream_id, 1);
        peer.respond(request.stream_id, b"200", b"fresh").await;
    };
    let (outcome, ()) = tokio::join!(
        dispatcher.execute(Request::new(destination.clone(), "GET /again")),
        peer
    );
    assert_eq!(outcome?.body().as_ref(), b"fresh");
    assert_eq!(dispatcher.stats(&destination).connections_created, 2);
    Ok(())
}

#[tokio::test]
async fn close_fails_every_stream_on_the_connection() -> TestResult {
    let (connector, mut listener) = DuplexConnector::new();
    let dispatcher = quiet_builder().build(connector)?;

    let (first, mut peer) = tokio::join!(
        dispatcher.start(Request::new(local_destination(), "GET /a")),
        listener.accept_handshaken(None)
    );
    let first = first?;
    let second = dispatcher
        .start(Request::new(local_destination(), "GET /b"))
        .await?;
    peer.read_request().await;
    let received = peer.read_request().await;
    peer.send_headers(received.stream_id, b"200", false).await;
    drop(peer);

    let first = first.response().await.expect_err("connection closed");
    let second = second.response().await.expect_err("connection closed");
    assert_eq!(first.close_phase(), Some(ClosePhase::AwaitingResponseHeaders));
    assert_eq!(second.close_phase(), Some(ClosePhase::AfterResponseHeaders));
    Ok(())
}

#[tokio::test]
async fn close_reports_how_far_each_request_was_written() -> TestResult {
    let (connector, mut listener) = DuplexConnector::new();
    let dispatcher = quiet_builder().build(connector)?;
    let upload = Request::new(local_destination(), "POST /upload").with_body_chunk(vec![0_u8; LARGE_BODY]);

    let (uploading, mut peer) = tokio::join!(
        dispatcher.start(upload),
        listener.accept_handshaken(None)
    );
    let uploading = uploading?;
    let queued = dispatcher
        .start(Request::new(local_destination(), "GET /queued"))
        .await?;
    assert!(matches!(
        peer.next_frame().await,
        Some(Frame::Headers { stream_id: 1, .. })
    ));
    drop(peer);

    let uploading = uploading.response().await.expect_err("connection closed");
    assert_eq!(uploading.kind(), ErrorKind::ConnectionClosed);
    assert_eq!(uploading.close_phase(), Some(ClosePhase::DuringRequestPayload));
    assert_eq!(
        uploading.to_string(),
        "connection closed while the request payload was being sent"
    );
    let queued = queued.response().await.expect_err("connection closed");
    assert_eq!(queued.close_phase(), Some(ClosePhase::BeforeRequestSent));
    assert_eq!(
        queued.to_string(),
        "connection closed before the request was sent"
    );
    assert_eq!(dispatcher.stats(&local_destination()).in_flight_streams, 0);
    Ok(())
}
