//! TCP transport backend simulating the RFCOMM link
//!
//! Stands in for the Bluetooth backend during development and in tests.
//! Peer addresses are `host:port` strings and the paired-device list is a
//! static table supplied at construction.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::error::LinkError;
use crate::transport::traits::{Adapter, BoxedTransport, Peer, Transport, TransportListener};

/// TCP stream wrapper implementing Transport
pub struct TcpTransport {
    inner: TcpStream,
    peer_name: String,
}

impl TcpTransport {
    pub fn new(stream: TcpStream, peer_name: impl Into<String>) -> Self {
        Self {
            inner: stream,
            peer_name: peer_name.into(),
        }
    }
}

impl AsyncRead for TcpTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl Transport for TcpTransport {
    fn peer_name(&self) -> &str {
        &self.peer_name
    }
}

/// Listening TCP socket
pub struct TcpTransportListener {
    listener: TcpListener,
}

#[async_trait]
impl TransportListener for TcpTransportListener {
    async fn accept(&mut self) -> Result<BoxedTransport, LinkError> {
        let (stream, addr) = self.listener.accept().await?;
        debug!("accepted inbound link from {addr}");
        Ok(Box::new(TcpTransport::new(stream, addr.to_string())))
    }
}

/// TCP adapter with a static peer table
pub struct TcpAdapter {
    listen_addr: SocketAddr,
    peers: Vec<Peer>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl TcpAdapter {
    pub fn new(listen_addr: SocketAddr, peers: Vec<Peer>) -> Self {
        Self {
            listen_addr,
            peers,
            local_addr: Mutex::new(None),
        }
    }

    /// Address the most recent listener actually bound, once one is up
    ///
    /// Useful with a port-zero listen address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap()
    }
}

#[async_trait]
impl Adapter for TcpAdapter {
    async fn listen(&self) -> Result<Box<dyn TransportListener>, LinkError> {
        let listener = TcpListener::bind(self.listen_addr).await?;
        let local = listener.local_addr()?;
        *self.local_addr.lock().unwrap() = Some(local);
        info!("listening on {local}");
        Ok(Box::new(TcpTransportListener { listener }))
    }

    async fn dial(&self, peer: &Peer) -> Result<BoxedTransport, LinkError> {
        debug!("connecting to {} at {}", peer.name, peer.address);
        let stream = TcpStream::connect(peer.address.as_str()).await?;
        Ok(Box::new(TcpTransport::new(stream, peer.name.clone())))
    }

    async fn paired_peers(&self) -> Result<Vec<Peer>, LinkError> {
        Ok(self.peers.clone())
    }

    async fn cancel_discovery(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_listen_dial_roundtrip() {
        let adapter = TcpAdapter::new("127.0.0.1:0".parse().unwrap(), Vec::new());
        let mut listener = adapter.listen().await.unwrap();
        let local = adapter.local_addr().expect("listener bound");

        let peer = Peer {
            name: "test-peer".into(),
            address: local.to_string(),
        };
        let (outbound, inbound) = tokio::join!(adapter.dial(&peer), listener.accept());
        let mut outbound = outbound.unwrap();
        let mut inbound = inbound.unwrap();
        assert_eq!(outbound.peer_name(), "test-peer");

        outbound.write_all(b"hi").await.unwrap();
        let mut buf = [0u8; 2];
        inbound.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");
    }

    #[tokio::test]
    async fn test_paired_peers_static_table() {
        let peers = vec![Peer {
            name: "alfa".into(),
            address: "127.0.0.1:9000".into(),
        }];
        let adapter = TcpAdapter::new("127.0.0.1:0".parse().unwrap(), peers.clone());
        assert_eq!(adapter.paired_peers().await.unwrap(), peers);
    }
}
