//! Error types for link management

use thiserror::Error;

/// Errors surfaced by the link manager and the transport adapters
#[derive(Debug, Error)]
pub enum LinkError {
    /// No paired peer with the requested name
    #[error("no paired peer named {0:?}")]
    PeerNotFound(String),

    /// More than one paired peer shares the requested name
    #[error("peer name {0:?} matches multiple paired devices")]
    AmbiguousPeer(String),

    /// Peer address could not be parsed for the active adapter
    #[error("invalid peer address {0:?}")]
    InvalidAddress(String),

    /// Transport-level I/O failure
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Bluetooth stack failure
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] bluer::Error),
}
