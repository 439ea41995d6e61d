//! Dispatcher configuration.
//!
//! Values are fixed when the dispatcher is built and shared read-only with the
//! pool and every connection it creates.

use std::{fmt, time::Duration};

use crate::{error::ConfigError, frame::CodecConfig, transport::SocketOptions};

/// Protocol spoken on pooled connections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Multiplexed: many concurrent streams share one connection.
    Http2,
    /// One stream at a time per connection.
    Http1,
}

impl Protocol {
    /// Whether the protocol carries concurrent streams on one connection.
    #[must_use]
    pub const fn is_multiplexed(self) -> bool { matches!(self, Self::Http2) }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http2 => "h2",
            Self::Http1 => "http/1.1",
        })
    }
}

/// Liveness probing of idle connections.
///
/// The monitor is inert when either value is `None`: no probes are sent and
/// the connection is never failed for missing acknowledgements.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use muxpool::HealthCheckConfig;
///
/// let config = HealthCheckConfig::default().timeout(Some(Duration::ZERO));
/// assert!(config.is_inert());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthCheckConfig {
    period: Option<Duration>,
    timeout: Option<Duration>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            period: Some(Duration::from_secs(5)),
            timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl HealthCheckConfig {
    /// Configuration that never probes.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            period: None,
            timeout: None,
        }
    }

    /// Set the interval between probes. `None` or zero disables probing.
    #[must_use]
    pub fn period(mut self, period: Option<Duration>) -> Self {
        self.period = period.filter(|value| !value.is_zero());
        self
    }

    /// Set the probe acknowledgement deadline. `None` or zero disables probing.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|value| !value.is_zero());
        self
    }

    /// Configured probe interval.
    #[must_use]
    pub const fn period_value(&self) -> Option<Duration> { self.period }

    /// Configured acknowledgement deadline.
    #[must_use]
    pub const fn timeout_value(&self) -> Option<Duration> { self.timeout }

    /// Returns `true` when the monitor never probes.
    #[must_use]
    pub const fn is_inert(&self) -> bool { self.period.is_none() || self.timeout.is_none() }
}

/// Complete, validated configuration of a dispatcher.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    pub(crate) protocol: Protocol,
    pub(crate) health_check: HealthCheckConfig,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) request_timeout: Option<Duration>,
    pub(crate) max_connections_per_destination: usize,
    pub(crate) max_concurrent_streams: u32,
    pub(crate) socket_options: SocketOptions,
    pub(crate) codec: CodecConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Http2,
            health_check: HealthCheckConfig::default(),
            read_timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            request_timeout: None,
            max_connections_per_destination: 4,
            max_concurrent_streams: 100,
            socket_options: SocketOptions::default(),
            codec: CodecConfig::default(),
        }
    }
}

impl DispatcherConfig {
    /// Protocol spoken on every pooled connection.
    #[must_use]
    pub const fn protocol(&self) -> Protocol { self.protocol }

    /// Health-check settings.
    #[must_use]
    pub const fn health_check(&self) -> HealthCheckConfig { self.health_check }

    /// Idle read timeout, if any.
    #[must_use]
    pub const fn read_timeout(&self) -> Option<Duration> { self.read_timeout }

    /// Connect and handshake timeout, if any.
    #[must_use]
    pub const fn connect_timeout(&self) -> Option<Duration> { self.connect_timeout }

    /// Per-request timeout applied by `execute`, if any.
    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> { self.request_timeout }

    /// Maximum number of pooled connections per destination.
    #[must_use]
    pub const fn max_connections_per_destination(&self) -> usize {
        self.max_connections_per_destination
    }

    /// Maximum number of concurrent streams on one connection.
    ///
    /// Serial protocols always carry a single stream regardless of this value.
    #[must_use]
    pub const fn max_concurrent_streams(&self) -> u32 {
        if self.protocol.is_multiplexed() {
            self.max_concurrent_streams
        } else {
            1
        }
    }

    /// Socket options applied by the TCP connector.
    #[must_use]
    pub const fn socket_options(&self) -> SocketOptions { self.socket_options }

    /// Frame codec settings.
    #[must_use]
    pub const fn codec(&self) -> CodecConfig { self.codec }

    /// Check the invariants every other component relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a limit is zero or a timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections_per_destination == 0 {
            return Err(ConfigError::InvalidConnectionLimit(0));
        }
        if self.max_concurrent_streams == 0 {
            return Err(ConfigError::InvalidStreamLimit(0));
        }
        let timeouts = [
            ("read timeout", self.read_timeout),
            ("connect timeout", self.connect_timeout),
            ("request timeout", self.request_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_some_and(|value| value.is_zero()) {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(DispatcherConfig::default().validate(), Ok(()));
    }

    #[rstest]
    #[case(Some(Duration::ZERO), Some(Duration::from_secs(1)))]
    #[case(Some(Duration::from_secs(1)), Some(Duration::ZERO))]
    #[case(None, Some(Duration::from_secs(1)))]
    fn zero_or_missing_values_make_the_monitor_inert(
        #[case] period: Option<Duration>,
        #[case] timeout: Option<Duration>,
    ) {
        let config = HealthCheckConfig::default().period(period).timeout(timeout);
        assert!(config.is_inert());
    }

    #[test]
    fn serial_protocol_carries_one_stream() {
        let config = DispatcherConfig {
            protocol: Protocol::Http1,
            ..DispatcherConfig::default()
        };
        assert_eq!(config.max_concurrent_streams(), 1);
    }

    #[test]
    fn zero_read_timeout_is_rejected() {
        let config = DispatcherConfig {
            read_timeout: Some(Duration::ZERO),
            ..DispatcherConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("read timeout"))
        );
    }
}
