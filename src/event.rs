//! Link events delivered to the consumer
//!
//! Events ride an unbounded channel so emission never blocks while the
//! manager lock is held; successive state changes therefore arrive in the
//! order they occurred.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::connection::LinkState;

/// Notifications emitted by the link manager and its workers
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// The link state changed
    StateChanged(LinkState),
    /// Bytes received from the peer; the payload is an owned snapshot
    DataReceived(Bytes),
    /// Bytes written to the peer, terminator included
    DataSent(Bytes),
    /// Display name of the peer on the established link
    RemoteName(String),
    /// Human-readable status message for the user
    Toast(String),
}

/// Sending side, cloned into every worker
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: mpsc::UnboundedSender<LinkEvent>,
}

impl EventSink {
    pub(crate) fn emit(&self, event: LinkEvent) {
        // A consumer that dropped the receiver just stops observing.
        let _ = self.tx.send(event);
    }
}

/// Receiving side, handed to the consumer by the manager constructor
pub struct LinkEvents {
    rx: mpsc::UnboundedReceiver<LinkEvent>,
}

impl LinkEvents {
    /// Receive the next event, or `None` once all senders are gone
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.rx.recv().await
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Option<LinkEvent> {
        self.rx.try_recv().ok()
    }
}

pub(crate) fn channel() -> (EventSink, LinkEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, LinkEvents { rx })
}
