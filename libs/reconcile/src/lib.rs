//! Batch reconciliation engine for NRP service and location sync.
//!
//! This library drives the batch updater that keeps the network resource
//! provider (NRP) in step with cluster load-balancer state. Key concepts:
//!
//! - **Diff source**: pending service additions/removals and location data
//!   since the last acknowledged sync.
//! - **Trigger**: single-slot signal; bursts collapse into one pass.
//! - **Cycle**: one run of the ordered sync protocol against the NRP.
//! - **Commit**: acknowledgement written back to the diff source.
//!
//! # Invariants
//!
//! - A step commits only after its remote call succeeded
//! - A failed step aborts the rest of its cycle and leaves its work pending
//! - Empty endpoint deltas are never committed
//! - Cycles run strictly one at a time

mod diff;
mod endpoints;
mod error;
mod observe;
mod reconciler;
mod remote;
mod retry;
mod shutdown;
mod trigger;

use std::time::Duration;

pub use diff::DiffSource;
pub use endpoints::{correlate, correlate_delta, CorrelationMode, EndpointCache, EndpointRecord};
pub use error::{CycleError, SyncError, SyncStep};
pub use observe::{log_diff_source, log_object};
pub use reconciler::{BatchReconciler, CycleReport};
pub use remote::{RemoteOperation, RemoteSync};
pub use retry::{retry_with_backoff, AttemptError, RetryPolicy};
pub use shutdown::{cancelled, is_cancelled};
pub use trigger::{trigger_channel, TriggerHandle, TriggerReceiver};

/// Default attempts per remote call, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default wait after the first failed attempt.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
