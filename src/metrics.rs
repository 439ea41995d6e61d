//! Metric helpers for `muxpool`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled every helper compiles to nothing.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

use crate::error::ErrorKind;

/// Name of the gauge tracking running connections.
pub const CONNECTIONS_ACTIVE: &str = "muxpool_connections_active";
/// Name of the counter tracking connections created.
pub const CONNECTIONS_CREATED: &str = "muxpool_connections_created_total";
/// Name of the gauge tracking streams in flight.
pub const STREAMS_ACTIVE: &str = "muxpool_streams_active";
/// Name of the counter tracking failed requests, labelled by error kind.
pub const ERRORS_TOTAL: &str = "muxpool_errors_total";

/// Increment the running connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the running connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a newly established connection.
pub fn inc_connections_created() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTIONS_CREATED).increment(1);
}

/// Increment the in-flight streams gauge.
pub fn inc_streams() {
    #[cfg(feature = "metrics")]
    gauge!(STREAMS_ACTIVE).increment(1.0);
}

/// Decrement the in-flight streams gauge.
pub fn dec_streams() {
    #[cfg(feature = "metrics")]
    gauge!(STREAMS_ACTIVE).decrement(1.0);
}

/// Record a failed request of the given kind.
pub fn inc_errors(kind: ErrorKind) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}
