use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use helio_domain::error::{DomainError, DomainResult};

/// Bounded randomized-exponential-backoff retry configuration.
///
/// This is the sole retry mechanism in the system; every outbound provider
/// HTTP call goes through it and nothing retries above it.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first, so `max_retries + 1` total
    pub max_retries: u32,
    /// Base backoff, doubled per attempt
    pub backoff_base: Duration,
    /// Cap applied after jitter
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff for a 0-indexed attempt: `base × 2^attempt`, jittered by a
    /// uniform factor in [0.5, 1.5), capped at `max_backoff`.
    fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let backoff_ms =
            self.backoff_base.as_millis() as f64 * 2f64.powi(attempt as i32) * jitter;
        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }
}

/// Run `op`, retrying on errors matching `is_retryable` with randomized
/// exponential backoff. Non-matching errors propagate immediately; on
/// exhaustion the last error is re-raised unchanged.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    is_retryable: impl Fn(&DomainError) -> bool,
    mut op: F,
) -> DomainResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        debug!(operation = %operation, attempt = attempt, "calling external operation");

        match op().await {
            Ok(value) => {
                debug!(operation = %operation, attempt = attempt, "external operation succeeded");
                return Ok(value);
            }
            Err(err) if is_retryable(&err) && attempt < policy.max_retries => {
                let backoff = policy.backoff_for_attempt(attempt);
                warn!(
                    operation = %operation,
                    attempt = attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "external operation failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => {
                if is_retryable(&err) {
                    warn!(
                        operation = %operation,
                        attempts = attempt + 1,
                        error = %err,
                        "external operation failed, retries exhausted"
                    );
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_exhaustion_makes_max_retries_plus_one_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result: DomainResult<()> = retry(
            &fast_policy(2),
            "always_fails",
            DomainError::is_transport,
            || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(DomainError::ProviderTransport("connection reset".to_string()))
                }
            },
        )
        .await;

        assert!(matches!(result, Err(DomainError::ProviderTransport(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_propagates_immediately() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result: DomainResult<()> = retry(
            &fast_policy(5),
            "unauthorized",
            DomainError::is_transport,
            || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(DomainError::TokenUnauthorized("rejected".to_string()))
                }
            },
        )
        .await;

        assert!(matches!(result, Err(DomainError::TokenUnauthorized(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = retry(
            &fast_policy(2),
            "flaky",
            DomainError::is_transport,
            || {
                let attempts = attempts_clone.clone();
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(DomainError::ProviderTransport("timed out".to_string()))
                    } else {
                        Ok(200)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 200);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_attempt_success_does_not_sleep() {
        let result = retry(
            &fast_policy(3),
            "healthy",
            DomainError::is_transport,
            || async { Ok("tok123") },
        )
        .await;

        assert_eq!(result.unwrap(), "tok123");
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            backoff_base: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
        };

        // Jitter is within [0.5, 1.5), so attempt 0 stays under 150ms
        assert!(policy.backoff_for_attempt(0) < Duration::from_millis(150));
        // Attempt 8 would be ~25s unjittered; the cap wins
        assert_eq!(policy.backoff_for_attempt(8), Duration::from_millis(300));
    }
}
