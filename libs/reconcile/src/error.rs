//! Error types for remote sync calls and reconciliation cycles.

use std::fmt;

use thiserror::Error;

/// Failure of a single NRP call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The request body could not be encoded. Never retried.
    #[error("failed to serialize request body: {0}")]
    Serialization(String),

    /// Network-level failure, reported once the attempt budget is spent.
    #[error("transport failure after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    /// The NRP answered outside the 2xx range. Never retried.
    #[error("NRP rejected request (status={status}): {body}")]
    Rejected { status: u16, body: String },

    /// Shutdown was signalled while the call or its backoff was in flight.
    #[error("cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

/// Steps of the ordered sync protocol, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncStep {
    AddServices,
    PropagateAddedEndpoints,
    PropagateRemovedEndpoints,
    UpdateLocations,
    RemoveServices,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStep::AddServices => "add_services",
            SyncStep::PropagateAddedEndpoints => "propagate_added_endpoints",
            SyncStep::PropagateRemovedEndpoints => "propagate_removed_endpoints",
            SyncStep::UpdateLocations => "update_locations",
            SyncStep::RemoveServices => "remove_services",
        };
        f.write_str(name)
    }
}

/// A cycle aborted at `step`; later steps did not run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{step} failed: {source}")]
pub struct CycleError {
    pub step: SyncStep,
    #[source]
    pub source: SyncError,
}

impl CycleError {
    pub fn new(step: SyncStep, source: SyncError) -> Self {
        Self { step, source }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, SyncError::Cancelled)
    }
}
