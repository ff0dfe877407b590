//! Single-slot coalescing trigger.
//!
//! Producers call [`TriggerHandle::trigger`] from any task without blocking.
//! The mailbox holds at most one pending signal, so a burst of triggers
//! before the reconciler wakes collapses into a single pass. Each pass
//! re-reads the full diff, so nothing is lost by dropping the extra signals.

use tokio::sync::mpsc;
use tracing::trace;

/// Create a connected trigger handle and receiver.
pub fn trigger_channel() -> (TriggerHandle, TriggerReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (TriggerHandle { tx }, TriggerReceiver { rx })
}

/// Cloneable, non-blocking handle used to request a reconciliation pass.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<()>,
}

impl TriggerHandle {
    /// Request a pass.
    ///
    /// Returns true if this call queued a new pass, false if one was already
    /// pending or the reconciler is gone.
    pub fn trigger(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                trace!("Pass already pending; trigger coalesced");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                trace!("Reconciler stopped; trigger ignored");
                false
            }
        }
    }
}

/// Receiving side of the trigger, owned by the reconciler.
#[derive(Debug)]
pub struct TriggerReceiver {
    rx: mpsc::Receiver<()>,
}

impl TriggerReceiver {
    /// Wait for the next pending trigger.
    ///
    /// Returns `None` once every handle has been dropped.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Consume a pending trigger without waiting.
    pub fn try_recv(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}
