//! Utilities for driving a [`Dispatcher`](muxpool::Dispatcher) against
//! scripted in-memory peers during tests.
//!
//! [`DuplexConnector`] plugs into the dispatcher as its connector and hands the
//! server half of every connection to a [`PeerListener`]. Each accepted
//! [`PeerConnection`] then plays the remote end frame by frame.
//!
//! ```rust
//! use muxpool_testing::{DuplexConnector, local_destination, quiet_builder};
//!
//! # async fn example() {
//! let (connector, mut listener) = DuplexConnector::new();
//! let dispatcher = quiet_builder().build(connector).expect("valid config");
//! let request = muxpool::Request::new(local_destination(), "GET /");
//! let peer = tokio::spawn(async move {
//!     let mut peer = listener.accept_handshaken(None).await;
//!     let request = peer.read_request().await;
//!     peer.respond(request.stream_id, b"200", b"ok").await;
//! });
//! let response = dispatcher.execute(request).await.expect("response");
//! assert_eq!(response.body().as_ref(), b"ok");
//! peer.await.expect("peer task");
//! # }
//! ```

mod connector;
pub mod logging;
mod peer;

use std::time::Duration;

pub use connector::{DuplexConnector, PeerListener};
pub use logging::{LoggerHandle, logger};
use muxpool::{Destination, DispatcherBuilder, HealthCheckConfig, Scheme};
pub use peer::{PeerConnection, ReceivedRequest};

/// Result type used by integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Destination used by tests that talk to in-memory peers.
#[must_use]
pub fn local_destination() -> Destination { Destination::new(Scheme::Http, "pool.test", 8080) }

/// Builder with every timer that could fire on its own switched off.
///
/// Tests opt back into the timers they exercise.
#[must_use]
pub fn quiet_builder() -> DispatcherBuilder {
    DispatcherBuilder::new()
        .health_check(HealthCheckConfig::disabled())
        .read_timeout(None)
        .connect_timeout(Some(Duration::from_secs(1)))
}

/// Yield to the scheduler until `condition` holds.
///
/// # Panics
///
/// Panics if the condition does not hold after a generous number of yields.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
