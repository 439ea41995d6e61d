//! Destinations and the keys the pool indexes connections by.

use std::fmt;

use crate::config::Protocol;

/// URI scheme of a destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plaintext transport.
    Http,
    /// Transport secured by the connector (for example TLS).
    Https,
}

impl Scheme {
    /// Lower-case scheme name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Port used when a destination does not name one.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// Remote endpoint a request is sent to.
///
/// # Examples
///
/// ```
/// use muxpool::{Destination, Scheme};
///
/// let destination = Destination::new(Scheme::Https, "example.com", 8443);
/// assert_eq!(destination.to_string(), "https://example.com:8443");
/// assert_eq!(destination.authority(), "example.com:8443");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Destination {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Destination {
    /// Create a destination from its parts.
    #[must_use]
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// Create a destination using the scheme's default port.
    #[must_use]
    pub fn with_default_port(scheme: Scheme, host: impl Into<String>) -> Self {
        Self::new(scheme, host, scheme.default_port())
    }

    /// Scheme of the destination.
    #[must_use]
    pub const fn scheme(&self) -> Scheme { self.scheme }

    /// Host name or address literal.
    #[must_use]
    pub fn host(&self) -> &str { &self.host }

    /// Port number.
    #[must_use]
    pub const fn port(&self) -> u16 { self.port }

    /// `host:port` form suitable for name resolution.
    #[must_use]
    pub fn authority(&self) -> String { format!("{}:{}", self.host, self.port) }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

/// Key identifying a family of interchangeable connections.
///
/// Two connections are interchangeable only when they reach the same
/// destination and speak the same protocol.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PoolKey {
    destination: Destination,
    protocol: Protocol,
}

impl PoolKey {
    /// Create a key from a destination and protocol.
    #[must_use]
    pub fn new(destination: Destination, protocol: Protocol) -> Self {
        Self {
            destination,
            protocol,
        }
    }

    /// Destination part of the key.
    #[must_use]
    pub fn destination(&self) -> &Destination { &self.destination }

    /// Protocol part of the key.
    #[must_use]
    pub const fn protocol(&self) -> Protocol { self.protocol }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.destination, self.protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_follow_the_scheme() {
        let plain = Destination::with_default_port(Scheme::Http, "localhost");
        let secure = Destination::with_default_port(Scheme::Https, "localhost");
        assert_eq!(plain.port(), 80);
        assert_eq!(secure.port(), 443);
    }

    #[test]
    fn keys_differ_by_protocol() {
        let destination = Destination::new(Scheme::Http, "localhost", 8080);
        let multiplexed = PoolKey::new(destination.clone(), Protocol::Http2);
        let serial = PoolKey::new(destination, Protocol::Http1);
        assert_ne!(multiplexed, serial);
        assert_eq!(multiplexed.to_string(), "http://localhost:8080 (h2)");
    }
}
