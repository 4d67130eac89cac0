//! Pluggable transport backends for the link

pub mod rfcomm;
pub mod tcp;
pub mod traits;

pub use rfcomm::{RfcommAdapter, RfcommConfig, DEFAULT_RFCOMM_CHANNEL};
pub use tcp::TcpAdapter;
pub use traits::{Adapter, BoxedTransport, Peer, Transport, TransportListener};
