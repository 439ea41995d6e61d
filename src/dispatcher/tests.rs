//! Unit tests for dispatcher tracing spans and per-operation timing.
//!
//! Tests use `#[traced_test]` from `tracing-test`. Span names appear in event
//! lines as context prefixes, so each test enables timing for the operation it
//! checks to produce an event inside that operation's span.

use std::io;

use async_trait::async_trait;
use rstest::rstest;
use tokio::io::DuplexStream;
use tracing_test::traced_test;

use super::{Dispatcher, DispatcherBuilder, TracingConfig};
use crate::{
    destination::{Destination, Scheme},
    error::ErrorKind,
    stream::Request,
    transport::Connector,
};

/// Connector whose every attempt is refused.
struct RefusingConnector;

#[async_trait]
impl Connector for RefusingConnector {
    type Io = DuplexStream;

    async fn connect(&self, _destination: &Destination) -> io::Result<DuplexStream> {
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }
}

fn dispatcher(tracing: TracingConfig) -> Dispatcher<RefusingConnector> {
    DispatcherBuilder::new()
        .tracing(tracing)
        .build(RefusingConnector)
        .expect("default configuration is valid")
}

fn request() -> Request { Request::new(Destination::new(Scheme::Http, "traced.test", 9000), "GET /") }

#[rstest]
#[traced_test]
#[tokio::test]
async fn execute_span_carries_destination_and_result() {
    let dispatcher = dispatcher(TracingConfig::default().with_execute_timing(true));

    let error = dispatcher
        .execute(request())
        .await
        .expect_err("connector refuses");
    assert_eq!(error.kind(), ErrorKind::Connect);

    logs_assert(|lines: &[&str]| {
        lines
            .iter()
            .find(|line| {
                line.contains("dispatcher.execute")
                    && line.contains("http://traced.test:9000")
                    && line.contains("connect")
                    && line.contains("operation.timing")
            })
            .map(|_| ())
            .ok_or_else(|| {
                format!(
                    "dispatcher.execute timing event not found in:\n{}",
                    lines.join("\n")
                )
            })
    });
}

#[rstest]
#[traced_test]
#[tokio::test]
async fn start_span_carries_destination() {
    let dispatcher = dispatcher(TracingConfig::default().with_start_timing(true));

    assert!(dispatcher.start(request()).await.is_err());

    logs_assert(|lines: &[&str]| {
        lines
            .iter()
            .find(|line| line.contains("dispatcher.start") && line.contains("operation.timing"))
            .map(|_| ())
            .ok_or_else(|| format!("dispatcher.start span not found in:\n{}", lines.join("\n")))
    });
}

#[rstest]
#[traced_test]
#[tokio::test]
async fn close_emits_timing_when_enabled() {
    let dispatcher = dispatcher(TracingConfig::default().with_close_timing(true));

    dispatcher.close().await;

    logs_assert(|lines: &[&str]| {
        lines
            .iter()
            .find(|line| line.contains("dispatcher.close") && line.contains("operation.timing"))
            .map(|_| ())
            .ok_or_else(|| format!("dispatcher.close span not found in:\n{}", lines.join("\n")))
    });
}

#[rstest]
#[traced_test]
#[tokio::test]
async fn timing_is_off_by_default() {
    let dispatcher = dispatcher(TracingConfig::default());

    let _ = dispatcher.execute(request()).await;
    dispatcher.close().await;

    assert!(!logs_contain("operation.timing"));
}
