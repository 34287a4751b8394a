//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cancel::Cancellation;
use crate::error::DeployError;

/// Polling cadence. Pure configuration, no state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay after the first attempt.
    pub base_delay_ms: u64,
    /// Multiplier applied to each further delay.
    pub backoff_factor: f64,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const fn new(base_delay_ms: u64, backoff_factor: f64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            backoff_factor,
            max_attempts,
        }
    }

    /// Import status polling.
    pub const fn import_status() -> Self {
        Self::new(500, 1.1, 50)
    }

    /// Per-locale build status polling.
    pub const fn build_status() -> Self {
        Self::new(1000, 1.2, 50)
    }

    /// Export status polling.
    pub const fn export_status() -> Self {
        Self::new(500, 1.1, 50)
    }

    /// Delay to wait after attempt `attempt` (1-based) before the next one.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.base_delay_ms as f64 * self.backoff_factor.powi(exponent);
        Duration::from_millis(millis.round() as u64)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            anyhow::bail!("max_attempts must be at least 1");
        }
        if self.backoff_factor.is_nan() || self.backoff_factor < 1.0 {
            anyhow::bail!(
                "backoff_factor must be >= 1.0, got {}",
                self.backoff_factor
            );
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::import_status()
    }
}

/// Repeatedly run `operation` until `should_continue` says the value is final.
///
/// - An error from `operation` is returned immediately, no further attempts.
/// - The first value for which `should_continue` is false is returned.
/// - After `max_attempts` non-final values, returns
///   [`DeployError::PollExhausted`].
///
/// The first attempt runs without delay; the wait after attempt `n` is
/// `base_delay_ms * backoff_factor^(n-1)`. No wait follows the last attempt.
/// Every attempt and every wait runs under `cancellation`.
pub async fn retry<T, F, Fut, P>(
    policy: &RetryPolicy,
    cancellation: &Cancellation,
    mut operation: F,
    mut should_continue: P,
) -> Result<T, DeployError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DeployError>>,
    P: FnMut(&T) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let value = cancellation.guard(operation()).await??;
        if !should_continue(&value) {
            debug!(attempt, "poll reached a final value");
            return Ok(value);
        }

        if attempt < max_attempts {
            let delay = policy.delay_after(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "not final, retrying");
            cancellation.sleep(delay).await?;
        }
    }

    Err(DeployError::PollExhausted {
        attempts: max_attempts,
    })
}
