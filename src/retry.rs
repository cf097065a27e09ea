//! Bounded retry with exponential backoff for network calls.
//!
//! Every outbound request (scrape fetches and model calls) runs through
//! [`with_retry`]. Each attempt is capped by `timeout`; failures are
//! classified by the caller:
//!
//! - [`Attempt::Transient`] → sleep `base_delay * 2^(n-1)` (exponent capped
//!   at 5) and try again, up to `max_attempts` total attempts.
//! - [`Attempt::Permanent`] → stop immediately.
//!
//! HTTP 429 and 5xx are transient, other 4xx are permanent, and connection
//! errors and timeouts are transient (see [`http_failure`]).

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Retry settings for one class of network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound on a single attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Delay before attempt number `attempt` (1-based; the first attempt
    /// never waits).
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = (attempt - 2).min(5);
        self.base_delay.saturating_mul(1 << exp)
    }
}

/// Outcome classification of a failed attempt.
#[derive(Debug)]
pub enum Attempt {
    Transient(anyhow::Error),
    Permanent(anyhow::Error),
}

impl Attempt {
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        Self::Transient(err.into())
    }

    pub fn permanent(err: impl Into<anyhow::Error>) -> Self {
        Self::Permanent(err.into())
    }
}

/// Terminal failure of a retried call.
#[derive(Error, Debug)]
pub enum RetryError {
    #[error("{label} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        label: String,
        attempts: u32,
        last: String,
    },
    #[error("{label} failed: {reason}")]
    Fatal { label: String, reason: String },
}

/// Run `op` under `policy`. `op` receives the 1-based attempt number.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Attempt>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last = String::from("no attempt made");

    for attempt in 1..=max_attempts {
        let delay = policy.backoff(attempt);
        if !delay.is_zero() {
            debug!(label, attempt, ?delay, "backing off before retry");
            tokio::time::sleep(delay).await;
        }

        match tokio::time::timeout(policy.timeout, op(attempt)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(Attempt::Permanent(e))) => {
                return Err(RetryError::Fatal {
                    label: label.to_string(),
                    reason: format!("{:#}", e),
                });
            }
            Ok(Err(Attempt::Transient(e))) => {
                warn!(label, attempt, max_attempts, error = %e, "attempt failed");
                last = format!("{:#}", e);
            }
            Err(_) => {
                warn!(label, attempt, max_attempts, timeout = ?policy.timeout, "attempt timed out");
                last = format!("timed out after {:?}", policy.timeout);
            }
        }
    }

    Err(RetryError::Exhausted {
        label: label.to_string(),
        attempts: max_attempts,
        last,
    })
}

/// Classify a non-success HTTP response.
pub fn http_failure(service: &str, status: reqwest::StatusCode, body: &str) -> Attempt {
    let err = anyhow::anyhow!("{} error {}: {}", service, status, truncate(body, 300));
    if status.as_u16() == 429 || status.is_server_error() {
        Attempt::Transient(err)
    } else {
        Attempt::Permanent(err)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(p.backoff(1), Duration::ZERO);
        assert_eq!(p.backoff(2), Duration::from_secs(1));
        assert_eq!(p.backoff(3), Duration::from_secs(2));
        assert_eq!(p.backoff(4), Duration::from_secs(4));
        assert_eq!(p.backoff(7), Duration::from_secs(32));
        assert_eq!(p.backoff(9), Duration::from_secs(32));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(Attempt::transient(anyhow::anyhow!("flaky")))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_max_attempts() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast_policy(2), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Attempt::transient(anyhow::anyhow!("down"))) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match err {
            RetryError::Exhausted { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert!(last.contains("down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast_policy(5), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Attempt::permanent(anyhow::anyhow!("bad request"))) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, RetryError::Fatal { .. }));
    }

    #[tokio::test]
    async fn slow_attempt_times_out() {
        let policy = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            timeout: Duration::from_millis(10),
        };
        let err = with_retry(&policy, "slow", |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, Attempt>(())
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn http_status_classification() {
        use reqwest::StatusCode;
        assert!(matches!(
            http_failure("api", StatusCode::TOO_MANY_REQUESTS, ""),
            Attempt::Transient(_)
        ));
        assert!(matches!(
            http_failure("api", StatusCode::BAD_GATEWAY, ""),
            Attempt::Transient(_)
        ));
        assert!(matches!(
            http_failure("api", StatusCode::UNAUTHORIZED, ""),
            Attempt::Permanent(_)
        ));
    }
}
