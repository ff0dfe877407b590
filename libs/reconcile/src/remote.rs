//! Remote sync client contract.

use std::fmt;

use async_trait::async_trait;
use nrp_types::{LocationsDataDto, ServicesDataDto, SyncScope};
use tokio::sync::watch;

use crate::error::SyncError;

/// The two idempotent NRP operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    UpdateServices,
    UpdateLocations,
}

impl RemoteOperation {
    /// Last path segment of the service gateway action.
    pub fn action(&self) -> &'static str {
        match self {
            RemoteOperation::UpdateServices => "UpdateServices",
            RemoteOperation::UpdateLocations => "UpdateLocations",
        }
    }
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

/// Client for the NRP service gateway.
///
/// `Ok(())` means the NRP accepted the request; any error is the abort reason
/// for the enclosing cycle step. Implementations must give up with
/// [`SyncError::Cancelled`] once `shutdown` flips to true.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    async fn update_services(
        &self,
        dto: &ServicesDataDto,
        scope: &SyncScope,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), SyncError>;

    async fn update_locations(
        &self,
        dto: &LocationsDataDto,
        scope: &SyncScope,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), SyncError>;
}
