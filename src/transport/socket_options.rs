//! Socket options applied by [`TcpConnector`](super::TcpConnector).

use std::{io, time::Duration};

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpSocket;

/// Socket options applied before connecting.
///
/// Unset options keep the operating system defaults.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use muxpool::SocketOptions;
///
/// let options = SocketOptions::default()
///     .nodelay(true)
///     .keepalive(Some(Duration::from_secs(30)));
/// assert_ne!(options, SocketOptions::default());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SocketOptions {
    nodelay: Option<bool>,
    keepalive: Option<Toggle>,
    linger: Option<Toggle>,
    send_buffer_size: Option<u32>,
    recv_buffer_size: Option<u32>,
    reuseaddr: Option<bool>,
    reuseport: Option<bool>,
}

/// An option that is either switched off or on with a duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Toggle {
    Off,
    After(Duration),
}

impl From<Option<Duration>> for Toggle {
    fn from(value: Option<Duration>) -> Self { value.map_or(Self::Off, Self::After) }
}

impl Toggle {
    const fn duration(self) -> Option<Duration> {
        match self {
            Self::Off => None,
            Self::After(value) => Some(value),
        }
    }
}

impl SocketOptions {
    /// Configure `TCP_NODELAY`.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = Some(enabled);
        self
    }

    /// Configure TCP keepalive. `None` switches keepalive off.
    #[must_use]
    pub fn keepalive(mut self, idle: Option<Duration>) -> Self {
        self.keepalive = Some(idle.into());
        self
    }

    /// Configure `SO_LINGER`. `None` switches lingering off.
    #[must_use]
    pub fn linger(mut self, duration: Option<Duration>) -> Self {
        self.linger = Some(duration.into());
        self
    }

    /// Configure the socket send buffer size.
    #[must_use]
    pub fn send_buffer_size(mut self, size: u32) -> Self {
        self.send_buffer_size = Some(size);
        self
    }

    /// Configure the socket receive buffer size.
    #[must_use]
    pub fn recv_buffer_size(mut self, size: u32) -> Self {
        self.recv_buffer_size = Some(size);
        self
    }

    /// Configure `SO_REUSEADDR`.
    #[must_use]
    pub fn reuseaddr(mut self, enabled: bool) -> Self {
        self.reuseaddr = Some(enabled);
        self
    }

    /// Configure `SO_REUSEPORT` where the platform supports it.
    #[must_use]
    pub fn reuseport(mut self, enabled: bool) -> Self {
        self.reuseport = Some(enabled);
        self
    }

    pub(crate) fn apply(&self, socket: &TcpSocket) -> io::Result<()> {
        if let Some(enabled) = self.nodelay {
            socket.set_nodelay(enabled)?;
        }
        if let Some(keepalive) = self.keepalive {
            socket.set_keepalive(keepalive.duration().is_some())?;
            if let Some(idle) = keepalive.duration() {
                SockRef::from(socket).set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))?;
            }
        }
        if let Some(linger) = self.linger {
            socket.set_linger(linger.duration())?;
        }
        if let Some(size) = self.send_buffer_size {
            socket.set_send_buffer_size(size)?;
        }
        if let Some(size) = self.recv_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }
        if let Some(enabled) = self.reuseaddr {
            socket.set_reuseaddr(enabled)?;
        }
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        if let Some(enabled) = self.reuseport {
            socket.set_reuseport(enabled)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn options_apply_to_a_fresh_socket() {
        let socket = TcpSocket::new_v4().expect("socket");
        SocketOptions::default()
            .nodelay(true)
            .keepalive(Some(Duration::from_secs(30)))
            .reuseaddr(true)
            .apply(&socket)
            .expect("apply options");
        assert!(socket.nodelay().expect("nodelay"));
        assert!(socket.keepalive().expect("keepalive"));
        assert!(socket.reuseaddr().expect("reuseaddr"));
    }
}
