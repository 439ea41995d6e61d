//! Transport seam between the pool and the network.
//!
//! The pool never opens sockets itself. It asks a [`Connector`] for a byte
//! stream to a [`Destination`] and runs the frame codec and handshake on top.
//! [`TcpConnector`] is the plaintext TCP implementation; tests plug in
//! in-memory connectors.

use std::io;

use async_trait::async_trait;
use log::debug;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpSocket, TcpStream},
};

use crate::destination::{Destination, Scheme};

mod socket_options;

pub use socket_options::SocketOptions;

/// Byte stream types a connection can run on.
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}
impl<T> TransportStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Opens byte streams to destinations.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Stream type produced by this connector.
    type Io: TransportStream;

    /// Open a new stream to `destination`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the destination cannot be reached.
    async fn connect(&self, destination: &Destination) -> io::Result<Self::Io>;
}

/// Plaintext TCP connector.
///
/// # Examples
///
/// ```
/// use muxpool::{SocketOptions, TcpConnector};
///
/// let connector = TcpConnector::new(SocketOptions::default().nodelay(true));
/// assert_eq!(*connector.socket_options(), SocketOptions::default().nodelay(true));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector {
    socket_options: SocketOptions,
}

impl TcpConnector {
    /// Create a connector applying `socket_options` to every socket.
    #[must_use]
    pub const fn new(socket_options: SocketOptions) -> Self { Self { socket_options } }

    /// Options applied to every socket.
    #[must_use]
    pub const fn socket_options(&self) -> &SocketOptions { &self.socket_options }
}

#[async_trait]
impl Connector for TcpConnector {
    type Io = TcpStream;

    async fn connect(&self, destination: &Destination) -> io::Result<TcpStream> {
        if destination.scheme() == Scheme::Https {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "the TCP connector does not secure connections; use a TLS-capable connector",
            ));
        }
        let mut last_error = None;
        for addr in tokio::net::lookup_host(destination.authority()).await? {
            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            self.socket_options.apply(&socket)?;
            match socket.connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("connect attempt failed: addr={addr}, error={e}");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses resolved for {destination}"),
            )
        }))
    }
}
