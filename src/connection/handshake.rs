//! Connection establishment: connect, exchange settings, build the actor.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use log::debug;
use tokio_util::{codec::Framed, sync::CancellationToken};

use super::{ConnectionActor, ConnectionEvents, ConnectionHandle};
use crate::{
    config::DispatcherConfig,
    destination::PoolKey,
    error::ConnectError,
    frame::{Frame, FrameCodec},
    session::ConnectionId,
    transport::{Connector, TransportStream},
};

/// Exchange settings with the peer.
///
/// Returns the concurrent-stream cap announced by the peer.
async fn handshake<Io: TransportStream>(
    framed: &mut Framed<Io, FrameCodec>,
    max_streams: u32,
) -> Result<Option<u32>, ConnectError> {
    framed
        .send(Frame::Settings {
            max_concurrent_streams: Some(max_streams),
        })
        .await?;
    match framed.next().await {
        Some(Ok(Frame::Settings {
            max_concurrent_streams,
        })) => Ok(max_concurrent_streams),
        Some(Ok(other)) => Err(ConnectError::Handshake(format!(
            "expected settings, received {}",
            other.kind()
        ))),
        Some(Err(e)) => Err(e.into()),
        None => Err(ConnectError::Closed),
    }
}

/// Connect to the key's destination and prepare an actor for it.
///
/// The actor is returned unstarted so the caller can index the connection
/// before it can report any event.
pub(crate) async fn establish<C: Connector>(
    connector: &C,
    id: ConnectionId,
    key: PoolKey,
    config: &DispatcherConfig,
    events: Arc<dyn ConnectionEvents>,
    shutdown: CancellationToken,
) -> Result<(ConnectionHandle, ConnectionActor<C::Io>), ConnectError> {
    let attempt = async {
        let io = connector.connect(key.destination()).await?;
        let mut framed = Framed::new(io, config.codec().build_codec());
        let peer_limit = handshake(&mut framed, config.max_concurrent_streams()).await?;
        Ok::<_, ConnectError>((framed, peer_limit))
    };
    let (framed, peer_limit) = match config.connect_timeout() {
        Some(limit) => tokio::time::timeout(limit, attempt)
            .await
            .map_err(|_| ConnectError::Timeout(limit))??,
        None => attempt.await?,
    };
    debug!("handshake complete: id={id}, key={key}, peer_limit={peer_limit:?}");
    Ok(ConnectionActor::new(
        framed, id, key, peer_limit, config, events, shutdown,
    ))
}
