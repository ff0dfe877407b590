//! Batch reconciler for syncing service and location state to the NRP.
//!
//! The reconciler:
//! - Sleeps until a coalesced trigger arrives
//! - Drains the diff source and runs the ordered sync protocol
//! - Acknowledges each step to the diff source only after the NRP accepted it
//!
//! Protocol steps, strictly in order:
//!
//! 1. Add services (remote)
//! 2. Propagate endpoints of added services (local commit)
//! 3. Propagate endpoints of removed services (local commit)
//! 4. Update locations (remote)
//! 5. Remove services (remote)
//!
//! A failed remote step aborts the rest of the cycle. Nothing the failed
//! step touched has been committed, so the next trigger retries it as is.

use std::collections::BTreeSet;
use std::sync::Arc;

use nrp_types::{AzureDtoMapper, DtoMapper, ServiceId, ServiceSyncSet, SyncScope};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::diff::DiffSource;
use crate::endpoints::{correlate_delta, CorrelationMode, EndpointCache};
use crate::error::{CycleError, SyncStep};
use crate::observe::{log_diff_source, log_object};
use crate::remote::RemoteSync;
use crate::shutdown::cancelled;
use crate::trigger::{trigger_channel, TriggerHandle, TriggerReceiver};

/// What a completed cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Services created in the NRP.
    pub services_added: usize,

    /// Endpoint deltas committed to the diff source.
    pub endpoint_deltas: usize,

    /// Locations pushed to the NRP.
    pub locations_synced: usize,

    /// Services removed from the NRP.
    pub services_removed: usize,
}

impl CycleReport {
    /// Returns true if the cycle found nothing to do.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Trigger-driven batch reconciler.
pub struct BatchReconciler {
    diff_source: Arc<dyn DiffSource>,
    endpoints: Arc<dyn EndpointCache>,
    remote: Arc<dyn RemoteSync>,
    mapper: Arc<dyn DtoMapper>,
    scope: SyncScope,
    trigger: TriggerReceiver,
}

impl BatchReconciler {
    /// Create a reconciler and the handle producers use to trigger it.
    ///
    /// The loop stops once every clone of the returned handle is dropped.
    pub fn new(
        diff_source: Arc<dyn DiffSource>,
        endpoints: Arc<dyn EndpointCache>,
        remote: Arc<dyn RemoteSync>,
        scope: SyncScope,
    ) -> (Self, TriggerHandle) {
        let (handle, trigger) = trigger_channel();
        let reconciler = Self {
            diff_source,
            endpoints,
            remote,
            mapper: Arc::new(AzureDtoMapper),
            scope,
            trigger,
        };
        (reconciler, handle)
    }

    /// Replace the DTO mapper.
    pub fn with_mapper(mut self, mapper: Arc<dyn DtoMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn scope(&self) -> &SyncScope {
        &self.scope
    }

    /// Run one cycle per trigger until shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            subscription_id = %self.scope.subscription_id,
            resource_group = %self.scope.resource_group,
            "Starting batch updater"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut shutdown) => {
                    info!("Batch updater shutting down");
                    break;
                }
                signal = self.trigger.recv() => {
                    if signal.is_none() {
                        info!("All trigger handles dropped, batch updater stopping");
                        break;
                    }

                    match self.run_cycle(&mut shutdown).await {
                        Ok(report) if report.is_noop() => debug!("Batch update found nothing to sync"),
                        Ok(report) => info!(
                            services_added = report.services_added,
                            endpoint_deltas = report.endpoint_deltas,
                            locations_synced = report.locations_synced,
                            services_removed = report.services_removed,
                            "Batch update complete"
                        ),
                        Err(e) if e.is_cancelled() => {
                            warn!(step = %e.step, "Batch update abandoned on shutdown");
                        }
                        Err(e) => error!(
                            step = %e.step,
                            error = %e.source,
                            "Batch update aborted, pending work kept for next trigger"
                        ),
                    }
                }
            }
        }
    }

    /// Execute the ordered sync protocol once.
    #[instrument(
        skip_all,
        fields(
            subscription_id = %self.scope.subscription_id,
            resource_group = %self.scope.resource_group,
        )
    )]
    pub async fn run_cycle(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<CycleReport, CycleError> {
        log_diff_source(self.diff_source.as_ref(), "begin");

        let sync_set = self.diff_source.get_sync_load_balancer_services();
        log_object("service_sync_set", &sync_set);

        let mut report = CycleReport::default();

        self.add_services(sync_set.additions(), shutdown).await?;
        report.services_added = sync_set.additions().len();

        report.endpoint_deltas += self.propagate_endpoints(
            sync_set.additions(),
            CorrelationMode::Added,
            SyncStep::PropagateAddedEndpoints,
        );
        report.endpoint_deltas += self.propagate_endpoints(
            sync_set.removals(),
            CorrelationMode::Removed,
            SyncStep::PropagateRemovedEndpoints,
        );

        report.locations_synced = self.update_locations(shutdown).await?;

        self.remove_services(sync_set.removals(), shutdown).await?;
        report.services_removed = sync_set.removals().len();

        log_diff_source(self.diff_source.as_ref(), "end");
        Ok(report)
    }

    async fn add_services(
        &self,
        additions: &BTreeSet<ServiceId>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), CycleError> {
        if additions.is_empty() {
            return Ok(());
        }

        let applied = ServiceSyncSet::additions_only(additions.clone());
        let request = self.mapper.map_services(&applied, &self.scope);
        log_object("create_services_request", &request);

        self.remote
            .update_services(&request, &self.scope, shutdown)
            .await
            .map_err(|e| CycleError::new(SyncStep::AddServices, e))?;

        self.diff_source.update_nrp_load_balancers(&applied);
        info!(count = additions.len(), "Created services in NRP");
        Ok(())
    }

    /// Commit endpoint deltas for `services`; returns how many were committed.
    fn propagate_endpoints(
        &self,
        services: &BTreeSet<ServiceId>,
        mode: CorrelationMode,
        step: SyncStep,
    ) -> usize {
        let mut committed = 0;

        for service in services {
            let Some(delta) = correlate_delta(self.endpoints.as_ref(), service, mode) else {
                debug!(%step, service = %service, "No endpoints to propagate");
                continue;
            };

            log_object("endpoint_delta", &delta);
            debug!(
                %step,
                service = %service,
                address_count = delta.addresses().len(),
                "Propagating endpoint addresses"
            );
            self.diff_source.update_k8s_endpoints(delta);
            committed += 1;
        }

        committed
    }

    /// Push pending location data; returns how many locations were synced.
    async fn update_locations(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<usize, CycleError> {
        let snapshot = self.diff_source.get_sync_locations_addresses();
        log_object("location_snapshot", &snapshot);
        if snapshot.is_empty() {
            return Ok(0);
        }

        let request = self.mapper.map_locations(&snapshot);
        log_object("update_locations_request", &request);

        self.remote
            .update_locations(&request, &self.scope, shutdown)
            .await
            .map_err(|e| CycleError::new(SyncStep::UpdateLocations, e))?;

        self.diff_source.update_locations_addresses(&snapshot);
        info!(count = snapshot.len(), "Updated locations in NRP");
        Ok(snapshot.len())
    }

    async fn remove_services(
        &self,
        removals: &BTreeSet<ServiceId>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), CycleError> {
        if removals.is_empty() {
            return Ok(());
        }

        let applied = ServiceSyncSet::removals_only(removals.clone());
        let request = self.mapper.map_services(&applied, &self.scope);
        log_object("remove_services_request", &request);

        self.remote
            .update_services(&request, &self.scope, shutdown)
            .await
            .map_err(|e| CycleError::new(SyncStep::RemoveServices, e))?;

        self.diff_source.update_nrp_load_balancers(&applied);
        info!(count = removals.len(), "Removed services from NRP");
        Ok(())
    }
}
