//! Request bodies for the NRP service gateway API and the mapping into them.

use serde::{Deserialize, Serialize};

use crate::types::{LocationSnapshot, ServiceSyncSet, SyncScope};

/// Body of `UpdateServices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServicesDataDto {
    pub services: Vec<ServiceDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceDto {
    /// Service identity as known to the NRP.
    pub service: String,
    /// ARM id of the load balancer fronting the service.
    pub load_balancer_id: String,
    /// True when the service is being removed.
    pub is_delete: bool,
}

/// Body of `UpdateLocations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocationsDataDto {
    pub locations: Vec<LocationDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocationDto {
    pub location: String,
    pub addresses: Vec<AddressDto>,
    /// Set when the location no longer hosts any address.
    pub is_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddressDto {
    pub address: String,
    pub services: Vec<String>,
}

/// Projection of domain types into NRP request bodies.
///
/// Implementations must be pure: same input, same output, no side effects.
pub trait DtoMapper: Send + Sync {
    fn map_services(&self, sync_set: &ServiceSyncSet, scope: &SyncScope) -> ServicesDataDto;

    fn map_locations(&self, snapshot: &LocationSnapshot) -> LocationsDataDto;
}

/// Mapper producing the Azure service gateway wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct AzureDtoMapper;

impl AzureDtoMapper {
    fn load_balancer_id(scope: &SyncScope, service: &str) -> String {
        format!(
            "{}/providers/Microsoft.Network/loadBalancers/{}",
            scope.resource_group_path(),
            service
        )
    }
}

impl DtoMapper for AzureDtoMapper {
    fn map_services(&self, sync_set: &ServiceSyncSet, scope: &SyncScope) -> ServicesDataDto {
        let additions = sync_set.additions().iter().map(|id| (id, false));
        let removals = sync_set.removals().iter().map(|id| (id, true));

        let services = additions
            .chain(removals)
            .map(|(id, is_delete)| ServiceDto {
                service: id.to_string(),
                load_balancer_id: Self::load_balancer_id(scope, id.as_str()),
                is_delete,
            })
            .collect();

        ServicesDataDto { services }
    }

    fn map_locations(&self, snapshot: &LocationSnapshot) -> LocationsDataDto {
        let locations = snapshot
            .locations
            .iter()
            .map(|(location, data)| LocationDto {
                location: location.clone(),
                addresses: data
                    .addresses
                    .iter()
                    .map(|(address, services)| AddressDto {
                        address: address.clone(),
                        services: services.iter().map(|s| s.to_string()).collect(),
                    })
                    .collect(),
                is_delete: data.is_empty(),
            })
            .collect();

        LocationsDataDto { locations }
    }
}
