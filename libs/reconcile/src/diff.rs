//! Contract of the diff source the reconciler drains and acknowledges.

use nrp_types::{EndpointDelta, LocationSnapshot, ServiceSyncSet};

/// Pending changes since the last acknowledged sync, and the place
/// acknowledgements are written back to.
///
/// Commits must be atomic with respect to the reads of the next cycle.
pub trait DiffSource: Send + Sync {
    /// Services to create in and remove from the NRP.
    fn get_sync_load_balancer_services(&self) -> ServiceSyncSet;

    /// Location data that differs from what the NRP last acknowledged.
    fn get_sync_locations_addresses(&self) -> LocationSnapshot;

    /// Record that the NRP accepted these service changes.
    fn update_nrp_load_balancers(&self, applied: &ServiceSyncSet);

    /// Fold one service's endpoint change into the pending location data.
    fn update_k8s_endpoints(&self, delta: EndpointDelta);

    /// Record that the NRP accepted this location data.
    fn update_locations_addresses(&self, applied: &LocationSnapshot);

    /// Structured view of internal state for debug logging.
    fn dump(&self) -> Option<serde_json::Value> {
        None
    }
}
