//! Accept loop for inbound links

use std::sync::Arc;

use tracing::{debug, warn};

use crate::event::LinkEvent;

use super::manager::Shared;

/// Accept inbound transports until superseded or the listening socket fails
///
/// If the listening transport cannot be created the failure is reported and
/// the loop never starts; listening setup is not retried.
pub(crate) async fn listen_loop(shared: Arc<Shared>, epoch: u64) {
    let mut listener = match shared.adapter.listen().await {
        Ok(listener) => listener,
        Err(e) => {
            warn!("unable to open listening transport: {e}");
            shared
                .events
                .emit(LinkEvent::Toast("Unable to listen for connections".into()));
            return;
        }
    };

    loop {
        match listener.accept().await {
            Ok(transport) => {
                if !shared.offer_inbound(epoch, transport).await {
                    break;
                }
            }
            Err(e) => {
                debug!("accept failed: {e}");
                break;
            }
        }
    }
}
