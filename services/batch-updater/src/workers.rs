//! Bounded shutdown of spawned loops.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, warn};

/// Wait for every worker to finish, sharing one `grace` deadline.
///
/// Returns how many workers were still running when it expired.
pub async fn join_workers(workers: Vec<(&'static str, JoinHandle<()>)>, grace: Duration) -> usize {
    let deadline = Instant::now() + grace;
    let mut stragglers = 0;

    for (name, handle) in workers {
        match tokio::time::timeout_at(deadline, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(worker = name, error = %e, "Worker task panicked"),
            Err(_) => {
                warn!(worker = name, "Worker did not stop in time");
                stragglers += 1;
            }
        }
    }

    stragglers
}
