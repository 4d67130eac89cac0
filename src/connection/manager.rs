//! The link manager: a single-link state machine over pluggable transports
//!
//! The manager owns the current [`LinkState`] and at most one worker per
//! role: an accept loop while disconnected, a dial task while connecting,
//! and a session (read loop plus write handle) once established. All state
//! mutation happens under one mutex. Workers report back with the epoch
//! they were spawned under; a report whose epoch no longer matches its slot
//! comes from a superseded worker and is discarded.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::event::{self, EventSink, LinkEvent, LinkEvents};
use crate::transport::{Adapter, BoxedTransport};
use crate::TEXT_TERMINATOR;

use super::dialer::dial_loop;
use super::listener::listen_loop;
use super::session::{read_loop, SessionHandle};
use super::state::LinkState;

/// A spawned listen or dial worker
struct Worker {
    epoch: u64,
    task: JoinHandle<()>,
}

impl Worker {
    /// Aborting the task drops its transport, which closes it and unblocks
    /// any pending accept or connect.
    fn cancel(self) {
        self.task.abort();
    }
}

/// The established session: read task plus write handle
struct Session {
    epoch: u64,
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl Session {
    fn cancel(self) {
        self.task.abort();
    }
}

/// Mutable state, guarded by a single mutex
struct Inner {
    state: LinkState,
    epoch: u64,
    listener: Option<Worker>,
    dialer: Option<Worker>,
    session: Option<Session>,
}

impl Inner {
    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }
}

/// State shared between the manager and its workers
pub(crate) struct Shared {
    pub(crate) config: LinkConfig,
    pub(crate) adapter: Arc<dyn Adapter>,
    pub(crate) events: EventSink,
    inner: Mutex<Inner>,
}

/// Manages the single point-to-point link
#[derive(Clone)]
pub struct LinkManager {
    shared: Arc<Shared>,
}

impl LinkManager {
    /// Create a manager in the idle state, plus the event stream it feeds
    pub fn new(adapter: Arc<dyn Adapter>, config: LinkConfig) -> (Self, LinkEvents) {
        let (events, receiver) = event::channel();
        let shared = Arc::new(Shared {
            config,
            adapter,
            events,
            inner: Mutex::new(Inner {
                state: LinkState::Idle,
                epoch: 0,
                listener: None,
                dialer: None,
                session: None,
            }),
        });
        (Self { shared }, receiver)
    }

    /// Start listening for inbound connections
    ///
    /// Cancels any dial or session in progress. Safe to call repeatedly;
    /// an already running accept loop is left in place.
    pub async fn start(&self) {
        let mut inner = self.shared.inner.lock().await;
        self.shared.start_locked(&mut inner);
    }

    /// Dial the paired peer with the given display name
    ///
    /// The name must match exactly one paired device; otherwise no
    /// connection attempt is made and the state is left unchanged.
    pub async fn connect_to(&self, peer_name: &str) -> Result<(), LinkError> {
        let peers = self.shared.adapter.paired_peers().await?;
        let mut matches = peers.into_iter().filter(|p| p.name == peer_name);
        let peer = match matches.next() {
            Some(peer) => peer,
            None => return Err(LinkError::PeerNotFound(peer_name.to_string())),
        };
        if matches.next().is_some() {
            return Err(LinkError::AmbiguousPeer(peer_name.to_string()));
        }

        let mut inner = self.shared.inner.lock().await;
        if let Some(dialer) = inner.dialer.take() {
            dialer.cancel();
        }
        if let Some(session) = inner.session.take() {
            session.cancel();
        }

        info!("dialing {} at {}", peer.name, peer.address);
        let epoch = inner.next_epoch();
        let task = tokio::spawn(dial_loop(self.shared.clone(), epoch, peer));
        inner.dialer = Some(Worker { epoch, task });
        self.shared.set_state(&mut inner, LinkState::Connecting);
        Ok(())
    }

    /// Send a text message over the established link
    ///
    /// A terminator byte marks the end of the message on the wire. Does
    /// nothing when the link is not connected or the message is empty. A
    /// failed transport write is returned to the caller; the link is left
    /// up.
    pub async fn send(&self, text: &str) -> Result<(), LinkError> {
        if text.is_empty() {
            return Ok(());
        }

        // Grab the session handle under the lock, write outside it.
        let session = {
            let inner = self.shared.inner.lock().await;
            if inner.state != LinkState::Connected {
                debug!("send ignored: link is {}", inner.state);
                return Ok(());
            }
            inner.session.as_ref().map(|s| s.handle.clone())
        };
        let Some(session) = session else {
            return Ok(());
        };

        let mut frame = BytesMut::with_capacity(text.len() + 1);
        frame.put_slice(text.as_bytes());
        frame.put_u8(TEXT_TERMINATOR);
        session.write(frame.freeze()).await
    }

    /// Tear the link down and stop all workers
    pub async fn stop(&self) {
        let mut inner = self.shared.inner.lock().await;
        if let Some(listener) = inner.listener.take() {
            listener.cancel();
        }
        if let Some(dialer) = inner.dialer.take() {
            dialer.cancel();
        }
        if let Some(session) = inner.session.take() {
            session.cancel();
        }
        self.shared.set_state(&mut inner, LinkState::Idle);
    }

    /// Current link state
    pub async fn state(&self) -> LinkState {
        self.shared.inner.lock().await.state
    }

    /// Display name of the connected peer, if any
    pub async fn connected_peer(&self) -> Option<String> {
        let inner = self.shared.inner.lock().await;
        inner.session.as_ref().map(|s| s.handle.peer.clone())
    }
}

impl Shared {
    /// Transition to listening: stop dial and session workers and make sure
    /// an accept loop is running.
    ///
    /// The listener slot is left untouched when occupied, even by a worker
    /// whose setup has since failed; listening setup is not retried.
    fn start_locked(self: &Arc<Self>, inner: &mut Inner) {
        if let Some(dialer) = inner.dialer.take() {
            dialer.cancel();
        }
        if let Some(session) = inner.session.take() {
            session.cancel();
        }

        self.set_state(inner, LinkState::Listening);

        if inner.listener.is_none() {
            let epoch = inner.next_epoch();
            let task = tokio::spawn(listen_loop(self.clone(), epoch));
            inner.listener = Some(Worker { epoch, task });
        }
    }

    /// Hand an accepted transport to the manager
    ///
    /// Returns whether the accept loop should keep running.
    pub(crate) async fn offer_inbound(
        self: &Arc<Self>,
        epoch: u64,
        transport: BoxedTransport,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.listener.as_ref().map(|w| w.epoch) != Some(epoch) {
            // Superseded while the accept was in flight.
            debug!("discarding inbound transport from a stale listener");
            drop(transport);
            return false;
        }

        match inner.state {
            LinkState::Listening | LinkState::Connecting => {
                self.promote(&mut inner, transport);
                false
            }
            LinkState::Idle => {
                debug!("closing inbound transport accepted while idle");
                drop(transport);
                true
            }
            LinkState::Connected => {
                debug!("closing duplicate inbound transport");
                drop(transport);
                false
            }
        }
    }

    /// A dial worker produced a transport
    pub(crate) async fn outbound_established(
        self: &Arc<Self>,
        epoch: u64,
        transport: BoxedTransport,
    ) {
        let mut inner = self.inner.lock().await;
        if inner.dialer.as_ref().map(|w| w.epoch) != Some(epoch) {
            debug!("discarding transport from a stale dial");
            drop(transport);
            return;
        }
        // This is the reporting worker itself; just clear the slot.
        inner.dialer = None;
        self.promote(&mut inner, transport);
    }

    /// A dial worker failed to connect
    pub(crate) async fn dial_failed(self: &Arc<Self>, epoch: u64) {
        let mut inner = self.inner.lock().await;
        if inner.dialer.as_ref().map(|w| w.epoch) != Some(epoch) {
            return;
        }
        inner.dialer = None;
        self.events
            .emit(LinkEvent::Toast("Unable to connect device".into()));
        self.start_locked(&mut inner);
    }

    /// The session read loop hit end of stream or a read error
    pub(crate) async fn session_lost(self: &Arc<Self>, epoch: u64) {
        let mut inner = self.inner.lock().await;
        if inner.session.as_ref().map(|s| s.epoch) != Some(epoch) {
            return;
        }
        inner.session = None;
        self.events
            .emit(LinkEvent::Toast("Device connection was lost".into()));
        self.start_locked(&mut inner);
    }

    /// Promote a transport to the established session
    ///
    /// Every other worker is cancelled first, so the session is the only
    /// one left running.
    fn promote(self: &Arc<Self>, inner: &mut Inner, transport: BoxedTransport) {
        if let Some(listener) = inner.listener.take() {
            listener.cancel();
        }
        if let Some(dialer) = inner.dialer.take() {
            dialer.cancel();
        }
        if let Some(session) = inner.session.take() {
            session.cancel();
        }

        let peer = transport.peer_name().to_string();
        let (reader, writer) = tokio::io::split(transport);
        let epoch = inner.next_epoch();
        let handle = SessionHandle::new(peer.clone(), writer, self.events.clone());
        let task = tokio::spawn(read_loop(self.clone(), epoch, reader));
        inner.session = Some(Session {
            epoch,
            handle,
            task,
        });

        info!("link established with {peer}");
        self.events.emit(LinkEvent::RemoteName(peer));
        self.set_state(inner, LinkState::Connected);
    }

    /// Record a state change and notify observers exactly once per change
    fn set_state(&self, inner: &mut Inner, next: LinkState) {
        if inner.state == next {
            return;
        }
        debug!("link state {} -> {}", inner.state, next);
        inner.state = next;
        self.events.emit(LinkEvent::StateChanged(next));
    }
}
