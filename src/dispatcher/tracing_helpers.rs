//! Tracing span and event helpers for dispatcher operations.
//!
//! These helpers centralise span creation with dynamic level selection and
//! per-operation timing, keeping the instrumentation out of the request path.

use std::time::Instant;

use tracing::{Level, Span};

use super::tracing_config::TracingConfig;
use crate::{destination::Destination, error::RequestError};

/// Create a tracing span at a dynamically selected level.
///
/// Each branch calls the corresponding `tracing::<level>_span!` macro so the
/// span metadata is statically known per branch while the selection is
/// dynamic.
macro_rules! dynamic_span {
    ($level:expr, $name:expr $(, $($field:tt)*)?) => {
        match $level {
            Level::ERROR => tracing::error_span!($name $(, $($field)*)?),
            Level::WARN  => tracing::warn_span!($name $(, $($field)*)?),
            Level::INFO  => tracing::info_span!($name $(, $($field)*)?),
            Level::DEBUG => tracing::debug_span!($name $(, $($field)*)?),
            Level::TRACE => tracing::trace_span!($name $(, $($field)*)?),
        }
    };
}

/// Create a span for the `execute` operation.
///
/// `stream.id`, `connection.id` and `result` are recorded as the request
/// progresses.
pub(crate) fn execute_span(config: &TracingConfig, destination: &Destination) -> Span {
    dynamic_span!(
        config.execute_level,
        "dispatcher.execute",
        destination = %destination,
        stream.id = tracing::field::Empty,
        connection.id = tracing::field::Empty,
        result = tracing::field::Empty
    )
}

/// Create a span for the `start` operation.
pub(crate) fn start_span(config: &TracingConfig, destination: &Destination) -> Span {
    dynamic_span!(
        config.start_level,
        "dispatcher.start",
        destination = %destination,
        stream.id = tracing::field::Empty,
        connection.id = tracing::field::Empty
    )
}

/// Create a span for the `close` operation.
pub(crate) fn close_span(config: &TracingConfig) -> Span {
    dynamic_span!(config.close_level, "dispatcher.close")
}

/// Record the outcome of a request on `span`.
pub(crate) fn record_result<T>(span: &Span, outcome: &Result<T, RequestError>) {
    match outcome {
        Ok(_) => span.record("result", "ok"),
        Err(e) => span.record("result", e.kind().as_str()),
    };
}

/// Record elapsed time if timing was enabled for this operation.
///
/// `start` is `None` when timing is disabled.
pub(crate) fn emit_timing_event(start: Option<Instant>) {
    if let Some(start) = start {
        let elapsed_us = start.elapsed().as_micros();
        tracing::debug!(elapsed_us = elapsed_us, "operation.timing");
    }
}
