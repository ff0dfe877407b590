//! Bounded retry with exponential backoff for NRP calls.
//!
//! Only transport-level failures are retried. A rejected request or an
//! unencodable body ends the call on the spot. Both the attempt and the
//! backoff wait race the shutdown signal, so cancellation never sleeps out
//! the remainder of an interval.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, warn};

use crate::error::SyncError;
use crate::shutdown::cancelled;
use crate::{DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_ATTEMPTS};

/// Retry budget for one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Wait after the first failed attempt; doubles after each further one.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

/// Why a single attempt did not succeed.
#[derive(Debug)]
pub enum AttemptError {
    /// Network-level failure; eligible for another attempt.
    Transport(String),

    /// Failure that ends the call immediately.
    Terminal(SyncError),
}

/// Run `attempt` until it succeeds, fails terminally, the budget runs out,
/// or shutdown is signalled.
///
/// `attempt` receives the 1-based attempt number.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &str,
    shutdown: &mut watch::Receiver<bool>,
    mut attempt: F,
) -> Result<T, SyncError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt_no = 0u32;

    loop {
        attempt_no += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancelled(shutdown) => return Err(SyncError::Cancelled),
            outcome = attempt(attempt_no) => outcome,
        };

        let message = match outcome {
            Ok(value) => return Ok(value),
            Err(AttemptError::Terminal(err)) => return Err(err),
            Err(AttemptError::Transport(message)) => message,
        };

        if attempt_no >= max_attempts {
            error!(
                operation,
                attempts = attempt_no,
                error = %message,
                "Remote call failed after max attempts"
            );
            return Err(SyncError::Transport {
                attempts: attempt_no,
                message,
            });
        }

        let delay = policy.backoff(attempt_no);
        warn!(
            operation,
            attempt = attempt_no,
            max_attempts,
            error = %message,
            delay_ms = delay.as_millis() as u64,
            "Remote call failed, retrying"
        );

        tokio::select! {
            biased;
            _ = cancelled(shutdown) => return Err(SyncError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
