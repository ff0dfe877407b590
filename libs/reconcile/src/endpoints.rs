//! Endpoint record cache contract and the endpoint correlator.

use std::collections::BTreeMap;

use nrp_types::{EndpointAddressMap, EndpointDelta, ServiceId};
use serde::{Deserialize, Serialize};

/// Snapshot of one discovered endpoint set (for example an EndpointSlice).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    /// Identity of the owning service, when the record carries one.
    pub owner: Option<String>,

    /// Pod address -> node address.
    pub addresses: EndpointAddressMap,
}

/// Read-only view of the live endpoint cache.
///
/// The cache may be mutated concurrently; a visit sees some consistent
/// snapshot, possibly a stale one.
pub trait EndpointCache: Send + Sync {
    /// Visit every cached record in iteration order.
    fn visit(&self, visitor: &mut dyn FnMut(&EndpointRecord));
}

impl EndpointCache for Vec<EndpointRecord> {
    fn visit(&self, visitor: &mut dyn FnMut(&EndpointRecord)) {
        for record in self {
            visitor(record);
        }
    }
}

/// Records keyed by name, visited in key order.
impl EndpointCache for BTreeMap<String, EndpointRecord> {
    fn visit(&self, visitor: &mut dyn FnMut(&EndpointRecord)) {
        for record in self.values() {
            visitor(record);
        }
    }
}

/// Whether a service is entering or leaving the NRP this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationMode {
    Added,
    Removed,
}

/// Merge the addresses of every record owned by `service`.
///
/// Ownership is compared case-insensitively. On a pod address collision the
/// record visited last wins.
pub fn correlate(cache: &dyn EndpointCache, service: &ServiceId) -> EndpointAddressMap {
    let mut merged = EndpointAddressMap::new();

    cache.visit(&mut |record| {
        let owned = record
            .owner
            .as_deref()
            .is_some_and(|owner| service.matches(owner));
        if owned {
            merged.extend(
                record
                    .addresses
                    .iter()
                    .map(|(pod, node)| (pod.clone(), node.clone())),
            );
        }
    });

    merged
}

/// Build the endpoint delta for `service`, or `None` when it has no addresses.
pub fn correlate_delta(
    cache: &dyn EndpointCache,
    service: &ServiceId,
    mode: CorrelationMode,
) -> Option<EndpointDelta> {
    let addresses = correlate(cache, service);
    if addresses.is_empty() {
        return None;
    }

    Some(match mode {
        CorrelationMode::Added => EndpointDelta::added(service.clone(), addresses),
        CorrelationMode::Removed => EndpointDelta::removed(service.clone(), addresses),
    })
}
