//! RFCOMM transport backend over BlueZ

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bluer::rfcomm::{Listener, SocketAddr, Stream};
use bluer::{Adapter as BtAdapter, Address};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::LinkError;
use crate::transport::traits::{Adapter, BoxedTransport, Peer, Transport, TransportListener};

/// Default RFCOMM channel for the link service
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Configuration for the RFCOMM adapter
#[derive(Debug, Clone)]
pub struct RfcommConfig {
    /// RFCOMM channel number
    pub channel: u8,
    /// How long a background inquiry scan runs before stopping on its own
    pub scan_duration: Duration,
}

impl Default for RfcommConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_RFCOMM_CHANNEL,
            scan_duration: Duration::from_secs(10),
        }
    }
}

/// RFCOMM stream wrapper implementing Transport
pub struct RfcommTransport {
    inner: Stream,
    peer_name: String,
}

impl RfcommTransport {
    fn new(stream: Stream, peer_name: String) -> Self {
        Self {
            inner: stream,
            peer_name,
        }
    }
}

impl AsyncRead for RfcommTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for RfcommTransport {
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

impl Transport for RfcommTransport {
    fn peer_name(&self) -> &str {
        &self.peer_name
    }
}

/// Listening RFCOMM socket
pub struct RfcommListener {
    listener: Listener,
    adapter: BtAdapter,
}

#[async_trait]
impl TransportListener for RfcommListener {
    async fn accept(&mut self) -> Result<BoxedTransport, LinkError> {
        let (stream, sa) = self.listener.accept().await?;
        let name = device_name(&self.adapter, sa.addr).await;
        debug!("accepted inbound link from {} ({})", sa.addr, name);
        Ok(Box::new(RfcommTransport::new(stream, name)))
    }
}

/// Bluetooth adapter backend using BlueZ
pub struct RfcommAdapter {
    adapter: BtAdapter,
    config: RfcommConfig,
    /// Background inquiry scan, if one is running
    scan: Mutex<Option<JoinHandle<()>>>,
    _session: bluer::Session,
}

impl RfcommAdapter {
    /// Open the default Bluetooth adapter and power it on
    pub async fn new(config: RfcommConfig) -> Result<Self, LinkError> {
        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;
        info!("using bluetooth adapter {}", adapter.name());

        Ok(Self {
            adapter,
            config,
            scan: Mutex::new(None),
            _session: session,
        })
    }

    /// Start a background inquiry scan to refresh the device list
    ///
    /// The scan stops after the configured duration, or earlier when
    /// `cancel_discovery` runs.
    pub async fn start_discovery(&self) -> Result<(), LinkError> {
        let mut scan = self.scan.lock().await;
        if scan.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }

        let adapter = self.adapter.clone();
        let duration = self.config.scan_duration;
        *scan = Some(tokio::spawn(async move {
            let discover = match adapter.discover_devices().await {
                Ok(discover) => discover,
                Err(e) => {
                    warn!("discovery failed to start: {e}");
                    return;
                }
            };
            tokio::pin!(discover);

            let _ = tokio::time::timeout(duration, async {
                use futures::StreamExt;
                while let Some(event) = discover.next().await {
                    if let bluer::AdapterEvent::DeviceAdded(addr) = event {
                        debug!("discovered device {addr}");
                    }
                }
            })
            .await;
            debug!("discovery scan finished");
        }));
        Ok(())
    }
}

#[async_trait]
impl Adapter for RfcommAdapter {
    async fn listen(&self) -> Result<Box<dyn TransportListener>, LinkError> {
        let local = SocketAddr::new(Address::any(), self.config.channel);
        let listener = Listener::bind(local).await?;
        info!("listening on rfcomm channel {}", self.config.channel);
        Ok(Box::new(RfcommListener {
            listener,
            adapter: self.adapter.clone(),
        }))
    }

    async fn dial(&self, peer: &Peer) -> Result<BoxedTransport, LinkError> {
        let addr: Address = peer
            .address
            .parse()
            .map_err(|_| LinkError::InvalidAddress(peer.address.clone()))?;
        let target = SocketAddr::new(addr, self.config.channel);

        debug!("connecting to {} channel {}", addr, self.config.channel);
        let stream = Stream::connect(target).await?;
        info!("connected to {}", addr);
        Ok(Box::new(RfcommTransport::new(stream, peer.name.clone())))
    }

    async fn paired_peers(&self) -> Result<Vec<Peer>, LinkError> {
        let mut peers = Vec::new();
        for addr in self.adapter.device_addresses().await? {
            let device = self.adapter.device(addr)?;
            if !device.is_paired().await.unwrap_or(false) {
                continue;
            }
            let name = device
                .name()
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| addr.to_string());
            peers.push(Peer {
                name,
                address: addr.to_string(),
            });
        }
        Ok(peers)
    }

    async fn cancel_discovery(&self) {
        if let Some(task) = self.scan.lock().await.take() {
            task.abort();
            debug!("cancelled device discovery");
        }
    }
}

/// Resolve a display name for a device, falling back to its address
async fn device_name(adapter: &BtAdapter, addr: Address) -> String {
    match adapter.device(addr) {
        Ok(device) => device
            .name()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| addr.to_string()),
        Err(_) => addr.to_string(),
    }
}
