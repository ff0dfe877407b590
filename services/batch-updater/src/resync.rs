//! Periodic resync trigger.
//!
//! Pending work survives failed cycles but nothing retries it on its own.
//! The resync loop triggers the batch updater on a fixed interval so stale
//! work is picked up even when the cluster is quiet.

use std::time::Duration;

use nrp_reconcile::{cancelled, TriggerHandle};
use tokio::sync::watch;
use tracing::{debug, info};

/// Trigger the batch updater every `interval` until shutdown.
pub async fn run_resync_loop(
    interval: Duration,
    trigger: TriggerHandle,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_secs = interval.as_secs(), "Starting resync loop");

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancelled(&mut shutdown) => {
                info!("Resync loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let queued = trigger.trigger();
                debug!(queued, "Resync tick");
            }
        }
    }
}
