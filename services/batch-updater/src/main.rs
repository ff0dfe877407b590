//! NRP Batch Updater
//!
//! Keeps the network resource provider (NRP) in step with the cluster's
//! load-balancer services and their endpoint locations.
//!
//! ## Architecture
//!
//! - **Batch Reconciler**: runs the ordered sync protocol once per trigger
//! - **State File Observer**: feeds desired state and triggers on change
//! - **Resync Loop**: periodic safety trigger for leftover pending work
//! - **NRP Client**: posts batches to the service gateway with retries

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use nrp_batch_updater::{
    apply_state, join_workers, load_state, run_resync_loop, run_state_file_loop, Config,
    EndpointSliceCache, InMemoryDiffTracker, NrpClient, StateFileConfig,
};
use nrp_reconcile::BatchReconciler;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Prefer RUST_LOG, fall back to NRP_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting NRP batch updater");
    info!(
        nrp_base_url = %config.nrp_base_url,
        subscription_id = %config.scope.subscription_id,
        resource_group = %config.scope.resource_group,
        max_attempts = config.retry.max_attempts,
        state_file = ?config.state_file,
        once = config.once,
        "Configuration loaded"
    );

    let tracker = Arc::new(InMemoryDiffTracker::new());
    let cache = Arc::new(EndpointSliceCache::new());
    let client = Arc::new(NrpClient::from_config(&config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (reconciler, trigger) = BatchReconciler::new(
        Arc::clone(&tracker) as _,
        Arc::clone(&cache) as _,
        client,
        config.scope.clone(),
    );

    if config.once {
        return run_once(&config, reconciler, &tracker, &cache, shutdown_rx).await;
    }

    let mut worker_handles = Vec::new();

    if let Some(path) = config.state_file.clone() {
        let state_config = StateFileConfig {
            path,
            poll_interval: config.state_poll_interval,
        };
        let handle = tokio::spawn(run_state_file_loop(
            state_config,
            Arc::clone(&tracker),
            Arc::clone(&cache),
            trigger.clone(),
            shutdown_rx.clone(),
        ));
        worker_handles.push(("state_file", handle));
    }

    if let Some(interval) = config.resync_interval {
        worker_handles.push((
            "resync",
            tokio::spawn(run_resync_loop(interval, trigger.clone(), shutdown_rx.clone())),
        ));
    }

    // Initial pass for anything already pending
    trigger.trigger();

    let mut reconciler_handle = tokio::spawn(reconciler.run(shutdown_rx.clone()));

    let reconciler_running = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            true
        }
        result = &mut reconciler_handle => {
            if let Err(e) = result {
                error!(error = %e, "Batch reconciler task panicked");
            } else {
                warn!("Batch reconciler exited");
            }
            false
        }
    };

    let _ = shutdown_tx.send(true);

    if reconciler_running {
        worker_handles.push(("reconciler", reconciler_handle));
    }

    info!("Waiting for workers to shut down...");
    join_workers(worker_handles, Duration::from_secs(5)).await;

    info!("NRP batch updater shutdown complete");
    Ok(())
}

/// Load the state file if configured, run one cycle, and report the outcome.
async fn run_once(
    config: &Config,
    reconciler: BatchReconciler,
    tracker: &InMemoryDiffTracker,
    cache: &EndpointSliceCache,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    if let Some(path) = &config.state_file {
        match load_state(path).await? {
            Some(loaded) => {
                apply_state(&loaded.state, tracker, cache);
                info!(digest = %loaded.digest, "Loaded cluster state");
            }
            None => warn!(path = %path.display(), "State file not present"),
        }
    }

    let report = reconciler
        .run_cycle(&mut shutdown)
        .await
        .context("batch update failed")?;

    info!(
        services_added = report.services_added,
        endpoint_deltas = report.endpoint_deltas,
        locations_synced = report.locations_synced,
        services_removed = report.services_removed,
        "One-shot batch update complete"
    );
    Ok(())
}
