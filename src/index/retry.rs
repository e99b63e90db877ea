//! Capped exponential backoff with jitter

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::{BASE_RETRY_DELAY_MS, MAX_FETCH_ATTEMPTS, MAX_RETRY_DELAY_MS};
use crate::index::error::Retryable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_FETCH_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(MAX_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits, for tests and callers that do their own pacing
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0 = first retry).
    ///
    /// Doubles every attempt with +/- 25% jitter, never above `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << attempt.min(20)).min(max);
        let jitter_range = exp / 4;
        let jitter = if jitter_range == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_range * 2)
        };
        Duration::from_millis((exp - jitter_range + jitter).min(max))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// runs out of attempts.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = e
                        .retry_after()
                        .map(|d| d.min(self.max_delay))
                        .unwrap_or_else(|| self.delay(attempt));
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt + 1,
                        self.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::error::FetchError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_exponentially_within_jitter() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60_000),
        };

        assert!((750..=1250).contains(&(policy.delay(0).as_millis() as u64)));
        assert!((1500..=2500).contains(&(policy.delay(1).as_millis() as u64)));
        assert!((3000..=5000).contains(&(policy.delay(2).as_millis() as u64)));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(2000),
        };

        assert!(policy.delay(9) <= Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn run_retries_retryable_errors_until_success() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, FetchError> = RetryPolicy::immediate(4)
            .run("fetch", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(FetchError::ServerError(502))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), FetchError> = RetryPolicy::immediate(3)
            .run("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::ServerError(503))
            })
            .await;

        assert!(matches!(result, Err(FetchError::ServerError(503))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);

        let result: Result<(), FetchError> = RetryPolicy::immediate(5)
            .run("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::NotFound("missing".into()))
            })
            .await;

        assert!(matches!(result, Err(FetchError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
