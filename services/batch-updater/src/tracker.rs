//! In-memory diff tracker.
//!
//! Keeps two views of the world:
//! - desired: services and location data observed in the cluster
//! - acknowledged: what the NRP last accepted
//!
//! Pending work is always the difference between the two, so a failed cycle
//! leaves it in place and the next cycle retries it unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use nrp_reconcile::{correlate, DiffSource, EndpointCache};
use nrp_types::{
    EndpointAddressMap, EndpointChange, EndpointDelta, Location, LocationSnapshot, ServiceId,
    ServiceSyncSet,
};
use serde::Serialize;
use tracing::{debug, error};

#[derive(Debug, Default, Serialize)]
struct TrackerState {
    k8s_services: BTreeSet<ServiceId>,
    nrp_services: BTreeSet<ServiceId>,
    k8s_locations: BTreeMap<String, Location>,
    nrp_locations: BTreeMap<String, Location>,
}

/// Diff source backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryDiffTracker {
    state: Mutex<TrackerState>,
}

impl InMemoryDiffTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the desired service set.
    pub fn set_services(&self, services: impl IntoIterator<Item = ServiceId>) {
        let mut state = self.state();
        state.k8s_services = services.into_iter().collect();
        debug!(count = state.k8s_services.len(), "Desired services replaced");
    }

    /// Mark a service as desired.
    pub fn add_service(&self, service: ServiceId) -> bool {
        self.state().k8s_services.insert(service)
    }

    /// Mark a service as no longer desired.
    pub fn remove_service(&self, service: &ServiceId) -> bool {
        self.state().k8s_services.remove(service)
    }

    /// Services the NRP has acknowledged.
    pub fn synced_services(&self) -> BTreeSet<ServiceId> {
        self.state().nrp_services.clone()
    }

    /// Desired location data.
    pub fn desired_locations(&self) -> BTreeMap<String, Location> {
        self.state().k8s_locations.clone()
    }

    /// Re-fold cached addresses of services that are both desired and
    /// acknowledged but missing from the desired location data.
    ///
    /// Returns the number of endpoint deltas folded in.
    pub fn restore_endpoints(&self, cache: &dyn EndpointCache) -> usize {
        let live: Vec<ServiceId> = {
            let state = self.state();
            state
                .k8s_services
                .intersection(&state.nrp_services)
                .cloned()
                .collect()
        };

        let mut restored = 0;
        for service in live {
            let expected = correlate(cache, &service);
            let missing: EndpointAddressMap = {
                let state = self.state();
                expected
                    .into_iter()
                    .filter(|(pod, node)| {
                        !state
                            .k8s_locations
                            .get(node)
                            .and_then(|location| location.addresses.get(pod))
                            .is_some_and(|services| services.contains(&service))
                    })
                    .collect()
            };
            if missing.is_empty() {
                continue;
            }

            debug!(service = %service, address_count = missing.len(), "Restoring endpoint addresses");
            self.update_k8s_endpoints(EndpointDelta::added(service, missing));
            restored += 1;
        }

        restored
    }
}

impl DiffSource for InMemoryDiffTracker {
    fn get_sync_load_balancer_services(&self) -> ServiceSyncSet {
        let state = self.state();
        let additions: BTreeSet<ServiceId> = state
            .k8s_services
            .difference(&state.nrp_services)
            .cloned()
            .collect();
        let removals: BTreeSet<ServiceId> = state
            .nrp_services
            .difference(&state.k8s_services)
            .cloned()
            .collect();

        match ServiceSyncSet::new(additions, removals) {
            Ok(set) => set,
            Err(e) => {
                error!(error = %e, "Inconsistent service diff");
                ServiceSyncSet::default()
            }
        }
    }

    fn get_sync_locations_addresses(&self) -> LocationSnapshot {
        let state = self.state();
        let names: BTreeSet<&String> = state
            .k8s_locations
            .keys()
            .chain(state.nrp_locations.keys())
            .collect();

        let locations = names
            .into_iter()
            .filter_map(|name| {
                let desired = state.k8s_locations.get(name).cloned().unwrap_or_default();
                let acked = state.nrp_locations.get(name);
                (acked != Some(&desired)).then(|| (name.clone(), desired))
            })
            .collect();

        LocationSnapshot { locations }
    }

    fn update_nrp_load_balancers(&self, applied: &ServiceSyncSet) {
        let mut state = self.state();
        state.nrp_services.extend(applied.additions().iter().cloned());
        for service in applied.removals() {
            state.nrp_services.remove(service);
        }
    }

    fn update_k8s_endpoints(&self, delta: EndpointDelta) {
        let mut state = self.state();
        let service = delta.identity;

        match delta.change {
            EndpointChange::Added(addresses) => {
                for (pod, node) in addresses {
                    state
                        .k8s_locations
                        .entry(node)
                        .or_default()
                        .addresses
                        .entry(pod)
                        .or_default()
                        .insert(service.clone());
                }
            }
            EndpointChange::Removed(addresses) => {
                for (pod, node) in addresses {
                    let Some(location) = state.k8s_locations.get_mut(&node) else {
                        continue;
                    };
                    if let Some(services) = location.addresses.get_mut(&pod) {
                        services.remove(&service);
                        if services.is_empty() {
                            location.addresses.remove(&pod);
                        }
                    }
                    if location.is_empty() {
                        state.k8s_locations.remove(&node);
                    }
                }
            }
        }
    }

    fn update_locations_addresses(&self, applied: &LocationSnapshot) {
        let mut state = self.state();
        for (name, location) in &applied.locations {
            if location.is_empty() {
                state.nrp_locations.remove(name);
            } else {
                state.nrp_locations.insert(name.clone(), location.clone());
            }
        }
    }

    fn dump(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&*self.state()).ok()
    }
}
