//! Cooperative cancellation on a `watch::Receiver<bool>` shutdown signal.

use tokio::sync::watch;

/// Returns true if shutdown has been signalled.
pub fn is_cancelled(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Resolve once shutdown is signalled.
///
/// A dropped sender that never signalled is not a shutdown; the future then
/// stays pending.
pub async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
