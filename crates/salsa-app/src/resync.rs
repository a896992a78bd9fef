use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use salsa_ports::types::MessageHandler;

/// Requests an out-of-band re-poll from the controller worker.
///
/// Requests never block. While one is still pending further requests
/// collapse into it.
#[derive(Debug, Clone)]
pub struct ResyncTrigger {
    tx: mpsc::Sender<()>,
}

impl ResyncTrigger {
    pub(crate) fn channel() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Returns `false` once the worker has gone away.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("resync already pending");
                true
            }
            Err(TrySendError::Closed(())) => {
                warn!("resync requested after controller stopped");
                false
            }
        }
    }

    /// Subscription callback that turns any inbound message into a resync.
    pub fn handler(&self) -> MessageHandler {
        let trigger = self.clone();
        Arc::new(move |payload: &[u8]| {
            info!(
                payload = %String::from_utf8_lossy(payload),
                "sync message received"
            );
            trigger.request();
        })
    }
}
