//! Transport trait abstraction for pluggable link backends

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::LinkError;

/// A previously paired peer device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Display name of the device
    pub name: String,
    /// Adapter-specific address (Bluetooth MAC, or `host:port` for TCP)
    pub address: String,
}

/// A bidirectional byte stream to a remote peer
///
/// Dropping the transport closes it. Closing is the only cancellation
/// mechanism and unblocks any read pending on the stream.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {
    /// Display name of the remote peer
    fn peer_name(&self) -> &str;
}

/// Boxed transport handed between workers
pub type BoxedTransport = Box<dyn Transport>;

/// A listening transport accepting inbound links
#[async_trait]
pub trait TransportListener: Send {
    /// Accept the next inbound transport
    async fn accept(&mut self) -> Result<BoxedTransport, LinkError>;
}

/// Platform adapter: device enumeration plus listening and dialing sockets
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Create a listening transport for inbound links
    async fn listen(&self) -> Result<Box<dyn TransportListener>, LinkError>;

    /// Connect outbound to a paired peer
    ///
    /// Takes the full peer entry so the returned transport can report the
    /// remote display name.
    async fn dial(&self, peer: &Peer) -> Result<BoxedTransport, LinkError>;

    /// Enumerate previously paired peers
    async fn paired_peers(&self) -> Result<Vec<Peer>, LinkError>;

    /// Stop any ongoing device discovery
    ///
    /// An inquiry scan in progress slows connection setup down; dial
    /// workers call this before connecting.
    async fn cancel_discovery(&self);
}
