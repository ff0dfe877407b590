//! Live endpoint slice cache.
//!
//! Uses ArcSwap so the reconciler can visit a consistent snapshot while the
//! observer swaps in updates. Readers never block writers.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use nrp_reconcile::{EndpointCache, EndpointRecord};
use tracing::debug;

/// Endpoint slices keyed by slice name.
pub type SliceMap = BTreeMap<String, EndpointRecord>;

/// Endpoint records discovered in the cluster, keyed by slice name.
pub struct EndpointSliceCache {
    slices: ArcSwap<SliceMap>,
}

impl Default for EndpointSliceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointSliceCache {
    pub fn new() -> Self {
        Self {
            slices: ArcSwap::from_pointee(SliceMap::new()),
        }
    }

    /// Add or replace one slice.
    pub fn upsert(&self, name: impl Into<String>, record: EndpointRecord) {
        let name = name.into();
        self.slices.rcu(|current| {
            let mut next = SliceMap::clone(current);
            next.insert(name.clone(), record.clone());
            next
        });
    }

    /// Remove one slice, returning what was cached for it.
    pub fn remove(&self, name: &str) -> Option<EndpointRecord> {
        let mut removed = None;
        self.slices.rcu(|current| {
            removed = current.get(name).cloned();
            let mut next = SliceMap::clone(current);
            next.remove(name);
            next
        });
        removed
    }

    /// Swap in a complete slice set.
    pub fn replace_all(&self, slices: SliceMap) {
        let count = slices.len();
        self.slices.store(Arc::new(slices));
        debug!(slice_count = count, "Endpoint slice cache replaced");
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<SliceMap> {
        self.slices.load_full()
    }

    pub fn len(&self) -> usize {
        self.slices.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.load().is_empty()
    }
}

impl EndpointCache for EndpointSliceCache {
    fn visit(&self, visitor: &mut dyn FnMut(&EndpointRecord)) {
        let snapshot = self.slices.load();
        for record in snapshot.values() {
            visitor(record);
        }
    }
}
