//! NRP batch updater service.
//!
//! Wires the batch reconciler to its collaborators:
//! - [`InMemoryDiffTracker`]: desired vs acknowledged state
//! - [`EndpointSliceCache`]: live endpoint slices
//! - [`NrpClient`]: HTTP client for the NRP service gateway
//! - observers that trigger cycles (state file, periodic resync)

pub mod client;
pub mod config;
pub mod endpoints;
pub mod resync;
pub mod state_file;
pub mod tracker;
pub mod workers;

pub use client::NrpClient;
pub use config::Config;
pub use endpoints::{EndpointSliceCache, SliceMap};
pub use resync::run_resync_loop;
pub use state_file::{
    apply_state, load_state, run_state_file_loop, ClusterState, EndpointSliceState, LoadedState,
    StateFileConfig,
};
pub use tracker::InMemoryDiffTracker;
pub use workers::join_workers;
