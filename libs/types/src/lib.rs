//! # nrp-types
//!
//! Domain types shared by the NRP batch updater.
//!
//! ## Design Principles
//!
//! - A sync set never lists the same service as both added and removed
//! - An endpoint delta carries either old or new addresses, never both
//! - Wire DTOs are a pure projection of the domain types
//!
//! ## Types
//!
//! - [`ServiceId`]: identity correlating a load-balanced service with its
//!   endpoint records and its NRP representation
//! - [`ServiceSyncSet`]: pending service additions and removals for one cycle
//! - [`EndpointDelta`]: pod -> node address changes for one service
//! - [`LocationSnapshot`]: every location (node) and the addresses it hosts
//! - [`ServicesDataDto`] / [`LocationsDataDto`]: request bodies for the NRP API

mod dto;
mod error;
mod types;

pub use dto::*;
pub use error::TypesError;
pub use types::*;
