//! Builder for configuring a dispatcher.

use std::time::Duration;

use super::{Dispatcher, TracingConfig};
use crate::{
    config::{DispatcherConfig, HealthCheckConfig, Protocol},
    error::ConfigError,
    frame::CodecConfig,
    transport::{Connector, SocketOptions, TcpConnector},
};

/// Builder for [`Dispatcher`].
///
/// Every setter consumes and returns the builder; values are validated once,
/// by [`build`](Self::build).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use muxpool::{Dispatcher, Protocol};
///
/// let dispatcher = Dispatcher::builder()
///     .protocol(Protocol::Http2)
///     .max_connections_per_destination(2)
///     .read_timeout(Some(Duration::from_secs(10)))
///     .build_tcp()
///     .expect("valid configuration");
/// assert_eq!(dispatcher.config().max_connections_per_destination(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    tracing: TracingConfig,
}

impl DispatcherBuilder {
    /// Create a builder with default settings.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Protocol spoken on pooled connections.
    #[must_use]
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.config.protocol = protocol;
        self
    }

    /// Replace the health-check settings.
    #[must_use]
    pub fn health_check(mut self, health_check: HealthCheckConfig) -> Self {
        self.config.health_check = health_check;
        self
    }

    /// Interval between probes. `None` or zero disables probing.
    #[must_use]
    pub fn health_check_period(mut self, period: Option<Duration>) -> Self {
        self.config.health_check = self.config.health_check.period(period);
        self
    }

    /// Probe acknowledgement deadline. `None` or zero disables probing.
    #[must_use]
    pub fn health_check_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.health_check = self.config.health_check.timeout(timeout);
        self
    }

    /// Close a connection after this long without inbound data.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Bound on connecting and handshaking a new connection.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Bound on a whole request as run by [`Dispatcher::execute`].
    #[must_use]
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Maximum number of connections per destination.
    #[must_use]
    pub fn max_connections_per_destination(mut self, limit: usize) -> Self {
        self.config.max_connections_per_destination = limit;
        self
    }

    /// Maximum number of concurrent streams per connection.
    #[must_use]
    pub fn max_concurrent_streams(mut self, limit: u32) -> Self {
        self.config.max_concurrent_streams = limit;
        self
    }

    /// Socket options used by [`build_tcp`](Self::build_tcp).
    #[must_use]
    pub fn socket_options(mut self, options: SocketOptions) -> Self {
        self.config.socket_options = options;
        self
    }

    /// Frame codec settings.
    #[must_use]
    pub fn codec(mut self, codec: CodecConfig) -> Self {
        self.config.codec = codec;
        self
    }

    /// Tracing span levels and timing.
    #[must_use]
    pub fn tracing(mut self, tracing: TracingConfig) -> Self {
        self.tracing = tracing;
        self
    }

    /// Build a dispatcher that opens connections through `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a limit or timeout is zero.
    pub fn build<C: Connector>(self, connector: C) -> Result<Dispatcher<C>, ConfigError> {
        self.config.validate()?;
        Ok(Dispatcher::new(connector, self.config, self.tracing))
    }

    /// Build a dispatcher using a [`TcpConnector`] with the configured socket
    /// options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a limit or timeout is zero.
    pub fn build_tcp(self) -> Result<Dispatcher<TcpConnector>, ConfigError> {
        let connector = TcpConnector::new(self.config.socket_options);
        self.build(connector)
    }
}
