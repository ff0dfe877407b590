//! Domain types for service and location synchronization.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

// =============================================================================
// Service identity
// =============================================================================

/// Identity of a load-balancer-backed service.
///
/// The same identity names the service in the NRP and owns the endpoint
/// records discovered for it. Endpoint records may spell it with a different
/// letter case, so correlation goes through [`ServiceId::matches`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    /// Create a service identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against another identity string.
    pub fn matches(&self, other: &str) -> bool {
        self.0
            .chars()
            .flat_map(char::to_lowercase)
            .eq(other.chars().flat_map(char::to_lowercase))
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ServiceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// Service sync set
// =============================================================================

/// Pending service additions and removals for one reconciliation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceSyncSet {
    additions: BTreeSet<ServiceId>,
    removals: BTreeSet<ServiceId>,
}

impl ServiceSyncSet {
    /// Build a sync set, rejecting identities listed on both sides.
    pub fn new(
        additions: BTreeSet<ServiceId>,
        removals: BTreeSet<ServiceId>,
    ) -> Result<Self, TypesError> {
        let overlap: Vec<String> = additions
            .intersection(&removals)
            .map(|id| id.to_string())
            .collect();
        if !overlap.is_empty() {
            return Err(TypesError::OverlappingSyncSet(overlap));
        }

        Ok(Self {
            additions,
            removals,
        })
    }

    /// A sync set carrying only additions.
    pub fn additions_only(additions: BTreeSet<ServiceId>) -> Self {
        Self {
            additions,
            removals: BTreeSet::new(),
        }
    }

    /// A sync set carrying only removals.
    pub fn removals_only(removals: BTreeSet<ServiceId>) -> Self {
        Self {
            additions: BTreeSet::new(),
            removals,
        }
    }

    pub fn additions(&self) -> &BTreeSet<ServiceId> {
        &self.additions
    }

    pub fn removals(&self) -> &BTreeSet<ServiceId> {
        &self.removals
    }

    /// Returns true if there is nothing to add or remove.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

// =============================================================================
// Endpoints
// =============================================================================

/// Pod address -> node address.
pub type EndpointAddressMap = BTreeMap<String, String>;

/// Direction of an endpoint address change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointChange {
    /// Addresses now served by the service.
    Added(EndpointAddressMap),
    /// Addresses no longer served by the service.
    Removed(EndpointAddressMap),
}

/// Endpoint address change for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDelta {
    pub identity: ServiceId,
    pub change: EndpointChange,
}

impl EndpointDelta {
    pub fn added(identity: ServiceId, addresses: EndpointAddressMap) -> Self {
        Self {
            identity,
            change: EndpointChange::Added(addresses),
        }
    }

    pub fn removed(identity: ServiceId, addresses: EndpointAddressMap) -> Self {
        Self {
            identity,
            change: EndpointChange::Removed(addresses),
        }
    }

    /// Addresses being withdrawn, if this is a removal.
    pub fn old_addresses(&self) -> Option<&EndpointAddressMap> {
        match &self.change {
            EndpointChange::Removed(addresses) => Some(addresses),
            EndpointChange::Added(_) => None,
        }
    }

    /// Addresses being introduced, if this is an addition.
    pub fn new_addresses(&self) -> Option<&EndpointAddressMap> {
        match &self.change {
            EndpointChange::Added(addresses) => Some(addresses),
            EndpointChange::Removed(_) => None,
        }
    }

    /// The populated address map, whichever side it is on.
    pub fn addresses(&self) -> &EndpointAddressMap {
        match &self.change {
            EndpointChange::Added(addresses) | EndpointChange::Removed(addresses) => addresses,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.addresses().is_empty()
    }
}

// =============================================================================
// Locations
// =============================================================================

/// Addresses hosted at one location, each with the services it backs.
///
/// A location without addresses is reported when everything it hosted went
/// away, so the NRP can drop it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub addresses: BTreeMap<String, BTreeSet<ServiceId>>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Location data pending synchronization, keyed by location (node address).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSnapshot {
    pub locations: BTreeMap<String, Location>,
}

impl LocationSnapshot {
    /// Returns true if no location is pending.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }
}

// =============================================================================
// Scope
// =============================================================================

/// Subscription and resource group the NRP calls are addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncScope {
    pub subscription_id: String,
    pub resource_group: String,
}

impl SyncScope {
    /// Create a scope; both parts must be non-empty and free of `/`.
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
    ) -> Result<Self, TypesError> {
        let subscription_id = subscription_id.into();
        let resource_group = resource_group.into();

        for (name, value) in [
            ("subscription id", &subscription_id),
            ("resource group", &resource_group),
        ] {
            if value.trim().is_empty() {
                return Err(TypesError::InvalidScope(format!("{name} is empty")));
            }
            if value.contains('/') {
                return Err(TypesError::InvalidScope(format!(
                    "{name} contains '/': {value}"
                )));
            }
        }

        Ok(Self {
            subscription_id,
            resource_group,
        })
    }

    /// `/subscriptions/{sub}/resourceGroups/{rg}`
    pub fn resource_group_path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )
    }
}
