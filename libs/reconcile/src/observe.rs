//! Structured state dumps around each cycle.

use serde::Serialize;
use tracing::{debug, error, trace, Level};

use crate::diff::DiffSource;

/// Log the diff source's state at debug level, tagged with `phase`.
pub fn log_diff_source(source: &dyn DiffSource, phase: &'static str) {
    if !tracing::enabled!(Level::DEBUG) {
        return;
    }

    let Some(state) = source.dump() else {
        return;
    };

    match serde_json::to_string_pretty(&state) {
        Ok(json) => debug!(phase, state = %json, "Diff source state"),
        Err(e) => error!(phase, error = %e, "Failed to serialize diff source state"),
    }
}

/// Log any serializable value at trace level.
pub fn log_object<T: Serialize + ?Sized>(label: &'static str, value: &T) {
    if !tracing::enabled!(Level::TRACE) {
        return;
    }

    match serde_json::to_string(value) {
        Ok(json) => trace!(label, object = %json, "Batch updater object"),
        Err(e) => error!(label, error = %e, "Failed to serialize object"),
    }
}
