//! Batch updater configuration.
//!
//! Everything is env-driven. Parsing goes through a lookup function so tests
//! never have to touch the process environment.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use nrp_reconcile::RetryPolicy;
use nrp_types::SyncScope;

/// Batch updater configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// NRP base URL (example: http://nrp-bypass).
    pub nrp_base_url: String,

    /// Subscription and resource group the NRP calls are scoped to.
    pub scope: SyncScope,

    /// Timeout for a single HTTP attempt.
    pub request_timeout: Duration,

    /// Attempts and backoff per remote call.
    pub retry: RetryPolicy,

    /// Periodic safety trigger; `None` disables it.
    pub resync_interval: Option<Duration>,

    /// Optional cluster-state file to watch.
    pub state_file: Option<PathBuf>,

    /// How often the state file is polled.
    pub state_poll_interval: Duration,

    /// Run a single cycle and exit.
    pub once: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let nrp_base_url = lookup("NRP_BASE_URL")
            .unwrap_or_else(|| "http://nrp-bypass".to_string())
            .trim_end_matches('/')
            .to_string();

        let subscription_id = lookup("NRP_SUBSCRIPTION_ID")
            .context("Missing subscription id. Set NRP_SUBSCRIPTION_ID.")?;
        let resource_group = lookup("NRP_RESOURCE_GROUP")
            .context("Missing resource group. Set NRP_RESOURCE_GROUP.")?;
        let scope = SyncScope::new(subscription_id, resource_group)?;

        let request_timeout_secs: u64 = lookup("NRP_REQUEST_TIMEOUT_SECS")
            .map(|v| v.parse())
            .transpose()
            .context("NRP_REQUEST_TIMEOUT_SECS must be an integer (seconds).")?
            .unwrap_or(10);
        let request_timeout = Duration::from_secs(request_timeout_secs.max(1));

        let max_attempts: u32 = lookup("NRP_MAX_ATTEMPTS")
            .map(|v| v.parse())
            .transpose()
            .context("NRP_MAX_ATTEMPTS must be an integer.")?
            .unwrap_or(3)
            .clamp(1, 10);

        let retry_base_ms: u64 = lookup("NRP_RETRY_BASE_MS")
            .map(|v| v.parse())
            .transpose()
            .context("NRP_RETRY_BASE_MS must be an integer (milliseconds).")?
            .unwrap_or(1000);

        let resync_interval_secs: u64 = lookup("NRP_RESYNC_INTERVAL_SECS")
            .map(|v| v.parse())
            .transpose()
            .context("NRP_RESYNC_INTERVAL_SECS must be an integer (seconds).")?
            .unwrap_or(60);
        let resync_interval =
            (resync_interval_secs > 0).then(|| Duration::from_secs(resync_interval_secs));

        let state_file = lookup("NRP_STATE_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let state_poll_interval_ms: u64 = lookup("NRP_STATE_POLL_INTERVAL_MS")
            .map(|v| v.parse())
            .transpose()
            .context("NRP_STATE_POLL_INTERVAL_MS must be an integer (milliseconds).")?
            .unwrap_or(2000);
        let state_poll_interval = Duration::from_millis(state_poll_interval_ms.max(100));

        let once = lookup("NRP_SYNC_ONCE")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let log_level = lookup("NRP_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            nrp_base_url,
            scope,
            request_timeout,
            retry: RetryPolicy {
                max_attempts,
                initial_backoff: Duration::from_millis(retry_base_ms),
            },
            resync_interval,
            state_file,
            state_poll_interval,
            once,
            log_level,
        })
    }
}
