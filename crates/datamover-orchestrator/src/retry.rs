//! Bounded retry with a fixed delay and cancellation support.
//!
//! Used around location creation, where a freshly created bucket access role
//! may not yet be visible to DataSync.

use backon::{BackoffBuilder, ConstantBuilder};
use datamover_common::defaults::{
    DEFAULT_LOCATION_RETRY_ATTEMPTS, DEFAULT_LOCATION_RETRY_DELAY_SECS,
};
use datamover_common::{MoverError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Retry policy: up to `max_attempts` tries, `backoff_step` apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: usize,
    /// Wait before the first attempt
    pub initial_delay: Duration,
    /// Fixed wait between attempts
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_LOCATION_RETRY_ATTEMPTS,
            initial_delay: Duration::ZERO,
            backoff_step: Duration::from_secs(DEFAULT_LOCATION_RETRY_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, initial_delay: Duration, backoff_step: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff_step,
        }
    }

    /// Retry without waiting between attempts.
    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    fn delays(&self) -> impl Iterator<Item = Duration> {
        ConstantBuilder::default()
            .with_delay(self.backoff_step)
            .with_max_times(self.max_attempts.saturating_sub(1))
            .build()
    }
}

/// Sleep for `delay`; false if cancelled first.
async fn pause(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = token.cancelled() => false,
        },
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// On exhaustion (or cancellation between attempts) the last attempt's error
/// is returned unchanged; compensating cleanup is the caller's job.
///
/// # Example
/// ```ignore
/// let arn = retry(&RetryPolicy::default(), Some(&cancel), "create location", || async {
///     transfer.create_location_s3(input.clone()).await
/// })
/// .await?;
/// ```
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: Option<&CancellationToken>,
    operation: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if !policy.initial_delay.is_zero() && !pause(policy.initial_delay, cancel).await {
        return Err(MoverError::internal(format!("{operation} cancelled")));
    }

    let mut delays = policy.delays();
    let mut attempt = 0usize;

    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = %operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        let Some(delay) = delays.next() else {
            warn!(operation = %operation, attempts = attempt, error = %err, "Giving up");
            return Err(err);
        };

        debug!(
            operation = %operation,
            attempt,
            delay_ms = delay.as_millis(),
            error = %err,
            "Attempt failed, retrying"
        );

        if !pause(delay, cancel).await {
            warn!(operation = %operation, attempts = attempt, "Retry cancelled");
            return Err(err);
        }
    }
}
