//! Outbound dial task

use std::sync::Arc;

use tracing::debug;

use crate::transport::Peer;

use super::manager::Shared;

/// Dial a peer and hand the resulting transport to the manager
pub(crate) async fn dial_loop(shared: Arc<Shared>, epoch: u64, peer: Peer) {
    // An inquiry scan in progress slows the connect down considerably.
    shared.adapter.cancel_discovery().await;

    match shared.adapter.dial(&peer).await {
        Ok(transport) => shared.outbound_established(epoch, transport).await,
        Err(e) => {
            debug!("dial to {} failed: {e}", peer.name);
            shared.dial_failed(epoch).await;
        }
    }
}
