//! Bounded exponential backoff for transient external-service faults.
//!
//! Only errors classified as transient by `AppError::is_transient` are
//! retried; configuration and format errors surface immediately.

use atrium_core::AppResult;
use std::future::Future;
use std::time::Duration;

/// Backoff policy for a sequence of retries.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with the given retry count and default delays.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before the retry with the given index (0-based), doubling each
    /// time and capped at `max_delay`.
    fn delay_for(&self, retry: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << retry.min(16));
        exp.min(self.max_delay)
    }
}

/// Run an operation, retrying transient failures with exponential backoff.
///
/// Returns the first success, the first non-transient error, or the last
/// transient error once the retry budget is exhausted.
pub async fn with_backoff<T, F, Fut>(
    policy: BackoffPolicy,
    op_name: &str,
    mut op: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    op_name,
                    attempt + 1,
                    policy.max_retries + 1,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::warn!(
                        "{} failed after {} attempts: {}",
                        op_name,
                        attempt + 1,
                        err
                    );
                }
                return Err(err);
            }
        }
    }
}
