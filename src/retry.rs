//! Bounded exponential backoff for remote calls
//!
//! Every call to the Model Service, the Search Service and the content
//! fetcher goes through [`with_retry`]. Only rate-limit failures
//! ([`AppError::RateLimited`]) are retried; anything else propagates on the
//! first occurrence.

use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Retry policy shared by all pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of invocations, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent one
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
        }
    }

    /// Delay after the failed attempt with the given zero-based index
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Run `operation`, retrying rate-limited failures with exponential backoff.
///
/// Attempt `n` (zero-based) that fails with a rate-limit signal is followed by
/// a sleep of `base_delay_ms * 2^n` as long as attempts remain. Once
/// `max_attempts` invocations have failed the last error is returned.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() && attempt + 1 < max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off: {}",
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppError;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time::Instant;

    /// Operation that is rate limited `failures` times, then succeeds.
    fn flaky(
        failures: usize,
        calls: Arc<Mutex<Vec<Instant>>>,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<&'static str>>>> {
        move || {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                let mut calls = calls.lock();
                calls.push(Instant::now());
                if calls.len() <= failures {
                    Err(AppError::RateLimited("429 Too Many Requests".to_string()))
                } else {
                    Ok("done")
                }
            })
        }
    }

    fn gaps(calls: &[Instant]) -> Vec<Duration> {
        calls.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_rate_limits() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let policy = RetryPolicy::default();

        let result = with_retry(&policy, flaky(2, Arc::clone(&calls))).await;

        assert_eq!(result.unwrap(), "done");
        let calls = calls.lock();
        assert_eq!(calls.len(), 3);
        let gaps = gaps(&calls);
        assert!(gaps[0] >= Duration::from_millis(1000));
        assert!(gaps[1] >= Duration::from_millis(2000));
        assert!(gaps[1] > gaps[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_return_last_error() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let policy = RetryPolicy::new(3, 10);

        let result = with_retry(&policy, flaky(5, Arc::clone(&calls))).await;

        assert!(matches!(result, Err(AppError::RateLimited(_))));
        assert_eq!(calls.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let mut calls = 0;
        let policy = RetryPolicy::default();

        let result: Result<()> = with_retry(&policy, || {
            calls += 1;
            async { Err(AppError::Upstream("connection refused".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_immediate_success_calls_once() {
        let mut calls = 0;
        let result = with_retry(&RetryPolicy::default(), || {
            calls += 1;
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
    }
}
