//! Cluster state file observer.
//!
//! Polls a JSON document describing the desired services and the endpoint
//! slices backing them. When its content changes the observer:
//! - folds endpoint changes of already-synced services into the tracker
//! - swaps the new slices into the endpoint cache
//! - replaces the desired service set
//! - triggers the batch updater
//!
//! A missing file counts as "no change", so the file can be written later.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use nrp_reconcile::{cancelled, correlate, DiffSource, EndpointRecord, TriggerHandle};
use nrp_types::{EndpointAddressMap, EndpointDelta, ServiceId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::endpoints::{EndpointSliceCache, SliceMap};
use crate::tracker::InMemoryDiffTracker;

/// Desired cluster state as written to the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    /// Services that should exist in the NRP.
    #[serde(default)]
    pub services: BTreeSet<ServiceId>,

    /// Endpoint slices currently in the cluster.
    #[serde(default)]
    pub endpoint_slices: Vec<EndpointSliceState>,
}

/// One endpoint slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSliceState {
    pub name: String,

    /// Owning service, if the slice is labelled with one.
    #[serde(default)]
    pub service: Option<String>,

    /// Pod address -> node address.
    #[serde(default)]
    pub endpoints: EndpointAddressMap,
}

/// A parsed state file and the digest of its raw bytes.
#[derive(Debug, Clone)]
pub struct LoadedState {
    pub state: ClusterState,
    pub digest: String,
}

/// Digest used to detect content changes.
pub fn state_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Read and parse the state file. Returns `None` if it does not exist.
pub async fn load_state(path: &Path) -> Result<Option<LoadedState>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let state: ClusterState = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    Ok(Some(LoadedState {
        digest: state_digest(&bytes),
        state,
    }))
}

/// Apply a state document to the tracker and cache.
///
/// Returns the number of endpoint deltas folded into the tracker.
pub fn apply_state(
    state: &ClusterState,
    tracker: &InMemoryDiffTracker,
    cache: &EndpointSliceCache,
) -> usize {
    let previous = cache.snapshot();
    let next: SliceMap = state
        .endpoint_slices
        .iter()
        .map(|slice| {
            let record = EndpointRecord {
                owner: slice.service.clone(),
                addresses: slice.endpoints.clone(),
            };
            (slice.name.clone(), record)
        })
        .collect();

    cache.replace_all(next.clone());

    // Read after the swap: a service acknowledged from here on propagates
    // from the new slices. Services still pending addition pick their
    // endpoints up during the cycle that creates them.
    let mut deltas = 0;
    for service in tracker.synced_services() {
        let before = correlate(&*previous, &service);
        let after = correlate(&next, &service);

        let withdrawn = changed_entries(&before, &after);
        if !withdrawn.is_empty() {
            tracker.update_k8s_endpoints(EndpointDelta::removed(service.clone(), withdrawn));
            deltas += 1;
        }

        let introduced = changed_entries(&after, &before);
        if !introduced.is_empty() {
            tracker.update_k8s_endpoints(EndpointDelta::added(service.clone(), introduced));
            deltas += 1;
        }
    }

    tracker.set_services(state.services.iter().cloned());
    deltas += tracker.restore_endpoints(cache);

    deltas
}

/// Entries of `from` that `to` lacks or maps to a different node.
fn changed_entries(from: &EndpointAddressMap, to: &EndpointAddressMap) -> EndpointAddressMap {
    from.iter()
        .filter(|(pod, node)| to.get(*pod) != Some(*node))
        .map(|(pod, node)| (pod.clone(), node.clone()))
        .collect()
}

/// State file polling settings.
#[derive(Debug, Clone)]
pub struct StateFileConfig {
    pub path: PathBuf,
    pub poll_interval: Duration,
}

/// Poll the state file until shutdown, triggering on every content change.
pub async fn run_state_file_loop(
    config: StateFileConfig,
    tracker: Arc<InMemoryDiffTracker>,
    cache: Arc<EndpointSliceCache>,
    trigger: TriggerHandle,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        path = %config.path.display(),
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Starting state file observer"
    );

    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_digest: Option<String> = None;

    loop {
        tokio::select! {
            _ = cancelled(&mut shutdown) => {
                info!("State file observer shutting down");
                break;
            }
            _ = interval.tick() => {
                match load_state(&config.path).await {
                    Ok(Some(loaded)) if last_digest.as_deref() == Some(loaded.digest.as_str()) => {}
                    Ok(Some(loaded)) => {
                        let deltas = apply_state(&loaded.state, &tracker, &cache);
                        info!(
                            digest = %loaded.digest,
                            services = loaded.state.services.len(),
                            endpoint_slices = loaded.state.endpoint_slices.len(),
                            endpoint_deltas = deltas,
                            "Cluster state changed"
                        );
                        last_digest = Some(loaded.digest);
                        trigger.trigger();
                    }
                    Ok(None) => debug!(path = %config.path.display(), "State file not present"),
                    Err(e) => {
                        let message = format!("{e:#}");
                        warn!(error = %message, "Failed to load state file");
                    }
                }
            }
        }
    }
}
