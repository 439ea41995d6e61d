#![doc(html_root_url = "https://docs.rs/muxpool/latest")]
//! Public API for the `muxpool` library.
//!
//! This crate pools multiplexed client connections per destination and
//! dispatches requests over them. It reacts to peer shutdown notifications by
//! draining connections, probes idle connections for liveness, and classifies
//! every failure by how far the exchange had progressed.

pub mod config;
pub mod connection;
pub mod destination;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod pool;
pub mod session;
pub mod stream;
pub mod transport;

pub use config::{DispatcherConfig, HealthCheckConfig, Protocol};
pub use connection::{ConnectionState, OpenRejected, active_connection_count};
pub use destination::{Destination, PoolKey, Scheme};
pub use dispatcher::{Dispatcher, DispatcherBuilder, TracingConfig};
pub use error::{ClosePhase, ConfigError, ConnectError, ErrorKind, RequestError};
pub use metrics::{CONNECTIONS_ACTIVE, CONNECTIONS_CREATED, ERRORS_TOTAL, STREAMS_ACTIVE};
pub use pool::{ConnectionPool, PoolStats, Reservation};
pub use session::{ConnectionId, StreamId};
pub use stream::{Request, Response, StreamHandle};
pub use transport::{Connector, SocketOptions, TcpConnector, TransportStream};
