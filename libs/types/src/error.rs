//! Error types for domain type construction.

use thiserror::Error;

/// Errors that can occur when building domain types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// A service was listed as both added and removed.
    #[error("services present in both additions and removals: {}", .0.join(", "))]
    OverlappingSyncSet(Vec<String>),

    /// The subscription/resource-group scope is unusable.
    #[error("invalid sync scope: {0}")]
    InvalidScope(String),
}
