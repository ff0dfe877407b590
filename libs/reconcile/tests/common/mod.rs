//! Recording collaborators for reconciler tests.
//!
//! Every remote call and every commit is appended to one shared log, so a
//! test can assert the exact order the reconciler touched its dependencies.

#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nrp_reconcile::{cancelled, DiffSource, EndpointRecord, RemoteSync, SyncError};
use nrp_types::{
    EndpointDelta, Location, LocationSnapshot, LocationsDataDto, ServiceId, ServiceSyncSet,
    ServicesDataDto, SyncScope,
};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RemoteServices { added: Vec<String>, removed: Vec<String> },
    RemoteLocations { locations: Vec<String> },
    CommitServices { added: Vec<String>, removed: Vec<String> },
    CommitEndpoints(EndpointDelta),
    CommitLocations { locations: Vec<String> },
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<Call> {
    log.lock().unwrap().clone()
}

pub fn scope() -> SyncScope {
    SyncScope::new("sub-test", "rg-test").unwrap()
}

pub fn ids(values: &[&str]) -> BTreeSet<ServiceId> {
    values.iter().map(|v| ServiceId::from(*v)).collect()
}

pub fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn record(owner: &str, pairs: &[(&str, &str)]) -> EndpointRecord {
    EndpointRecord {
        owner: Some(owner.to_string()),
        addresses: pairs
            .iter()
            .map(|(pod, node)| (pod.to_string(), node.to_string()))
            .collect(),
    }
}

pub fn snapshot(location_names: &[&str]) -> LocationSnapshot {
    let mut snapshot = LocationSnapshot::default();
    for name in location_names {
        snapshot
            .locations
            .insert(name.to_string(), Location::default());
    }
    snapshot
}

fn split(set: &ServiceSyncSet) -> (Vec<String>, Vec<String>) {
    (
        set.additions().iter().map(|s| s.to_string()).collect(),
        set.removals().iter().map(|s| s.to_string()).collect(),
    )
}

// =============================================================================
// Diff source
// =============================================================================

/// Diff source returning fixed pending data and recording commits.
pub struct RecordingDiffSource {
    log: CallLog,
    sync_set: ServiceSyncSet,
    locations: LocationSnapshot,
    reads: AtomicUsize,
}

impl RecordingDiffSource {
    pub fn new(log: CallLog, sync_set: ServiceSyncSet, locations: LocationSnapshot) -> Self {
        Self {
            log,
            sync_set,
            locations,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn empty(log: CallLog) -> Self {
        Self::new(log, ServiceSyncSet::default(), LocationSnapshot::default())
    }

    /// Number of times a cycle started (service set reads).
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl DiffSource for RecordingDiffSource {
    fn get_sync_load_balancer_services(&self) -> ServiceSyncSet {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.sync_set.clone()
    }

    fn get_sync_locations_addresses(&self) -> LocationSnapshot {
        self.locations.clone()
    }

    fn update_nrp_load_balancers(&self, applied: &ServiceSyncSet) {
        let (added, removed) = split(applied);
        self.log
            .lock()
            .unwrap()
            .push(Call::CommitServices { added, removed });
    }

    fn update_k8s_endpoints(&self, delta: EndpointDelta) {
        self.log.lock().unwrap().push(Call::CommitEndpoints(delta));
    }

    fn update_locations_addresses(&self, applied: &LocationSnapshot) {
        let locations = applied.locations.keys().cloned().collect();
        self.log
            .lock()
            .unwrap()
            .push(Call::CommitLocations { locations });
    }
}

// =============================================================================
// Remote
// =============================================================================

/// Remote answering from per-operation scripts; `Ok(())` once a script is empty.
pub struct ScriptedRemote {
    log: CallLog,
    services: Mutex<VecDeque<Result<(), SyncError>>>,
    locations: Mutex<VecDeque<Result<(), SyncError>>>,
}

impl ScriptedRemote {
    pub fn ok(log: CallLog) -> Self {
        Self {
            log,
            services: Mutex::new(VecDeque::new()),
            locations: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_services(self, results: Vec<Result<(), SyncError>>) -> Self {
        *self.services.lock().unwrap() = results.into();
        self
    }

    pub fn with_locations(self, results: Vec<Result<(), SyncError>>) -> Self {
        *self.locations.lock().unwrap() = results.into();
        self
    }
}

#[async_trait]
impl RemoteSync for ScriptedRemote {
    async fn update_services(
        &self,
        dto: &ServicesDataDto,
        _scope: &SyncScope,
        _shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        let (removed, added): (Vec<_>, Vec<_>) = dto.services.iter().partition(|s| s.is_delete);
        self.log.lock().unwrap().push(Call::RemoteServices {
            added: added.into_iter().map(|s| s.service.clone()).collect(),
            removed: removed.into_iter().map(|s| s.service.clone()).collect(),
        });
        self.services.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn update_locations(
        &self,
        dto: &LocationsDataDto,
        _scope: &SyncScope,
        _shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        self.log.lock().unwrap().push(Call::RemoteLocations {
            locations: dto.locations.iter().map(|l| l.location.clone()).collect(),
        });
        self.locations.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// Remote whose calls hang until shutdown, then report cancellation.
pub struct HangingRemote;

#[async_trait]
impl RemoteSync for HangingRemote {
    async fn update_services(
        &self,
        _dto: &ServicesDataDto,
        _scope: &SyncScope,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        cancelled(shutdown).await;
        Err(SyncError::Cancelled)
    }

    async fn update_locations(
        &self,
        _dto: &LocationsDataDto,
        _scope: &SyncScope,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        cancelled(shutdown).await;
        Err(SyncError::Cancelled)
    }
}
