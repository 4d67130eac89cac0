//! Established link session: read loop and writes

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::event::{EventSink, LinkEvent};
use crate::error::LinkError;
use crate::transport::BoxedTransport;

use super::manager::Shared;

/// Cloneable handle for writing to the established link
///
/// Writes are serialized through the writer mutex, so a write in progress
/// and a session teardown never touch the transport at the same time.
#[derive(Clone)]
pub(crate) struct SessionHandle {
    pub(crate) peer: String,
    writer: Arc<Mutex<WriteHalf<BoxedTransport>>>,
    events: EventSink,
}

impl SessionHandle {
    pub(crate) fn new(peer: String, writer: WriteHalf<BoxedTransport>, events: EventSink) -> Self {
        Self {
            peer,
            writer: Arc::new(Mutex::new(writer)),
            events,
        }
    }

    /// Write the full frame to the transport and report it
    ///
    /// Failures are returned to the caller; they do not tear the link down.
    pub(crate) async fn write(&self, frame: Bytes) -> Result<(), LinkError> {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.write_all(&frame).await {
            warn!("write to {} failed: {e}", self.peer);
            return Err(e.into());
        }
        if let Err(e) = writer.flush().await {
            warn!("flush to {} failed: {e}", self.peer);
            return Err(e.into());
        }
        drop(writer);

        self.events.emit(LinkEvent::DataSent(frame));
        Ok(())
    }
}

/// Read loop for an established session
///
/// Every received chunk is emitted as an owned snapshot. End of stream or a
/// read error is the sole disconnect signal; the manager is told so it can
/// fall back to listening.
pub(crate) async fn read_loop(
    shared: Arc<Shared>,
    epoch: u64,
    mut reader: ReadHalf<BoxedTransport>,
) {
    let mut buf = vec![0u8; shared.config.read_buffer_size];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("peer closed the link");
                shared.session_lost(epoch).await;
                break;
            }
            Ok(n) => {
                shared
                    .events
                    .emit(LinkEvent::DataReceived(Bytes::copy_from_slice(&buf[..n])));
            }
            Err(e) => {
                debug!("read failed: {e}");
                shared.session_lost(epoch).await;
                break;
            }
        }
    }
}
