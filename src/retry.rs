//! Bounded retry for flaky checks
//!
//! A freshly scheduled deployment can briefly under-report readiness. Checks
//! that may hit that window are re-run a bounded number of times with a fixed
//! delay, and only the last failure is reported.
//!
//! # Example
//!
//! ```ignore
//! use kube_smoke::retry::{retry, RetryPolicy};
//!
//! // One run plus five reruns, ten seconds apart
//! retry(RetryPolicy::reruns(5, Duration::from_secs(10)), || async {
//!     checks::pods_available(&cluster, &deployments).await
//! })
//! .await?;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how far apart to run a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of runs, at least 1
    pub attempts: u32,
    /// Fixed delay between two runs
    pub delay: Duration,
}

impl RetryPolicy {
    /// Run up to `attempts` times in total (clamped to at least 1)
    #[must_use]
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// One run plus `reruns` reruns
    #[must_use]
    pub fn reruns(reruns: u32, delay: Duration) -> Self {
        Self::new(reruns.saturating_add(1), delay)
    }

    /// Run exactly once
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    /// Five reruns, ten seconds apart
    fn default() -> Self {
        Self::reruns(5, Duration::from_secs(10))
    }
}

/// Run `f` until it succeeds or the policy's attempts are used up
///
/// Failed attempts are discarded; the error of the last attempt is returned.
pub async fn retry<F, Fut, T, E>(policy: RetryPolicy, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(value) => {
                debug!(attempt = attempt, "Check succeeded");
                return Ok(value);
            }
            Err(e) if attempt >= max_attempts => {
                warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Check failed on every attempt"
                );
                return Err(e);
            }
            Err(e) => {
                debug!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay = ?policy.delay,
                    error = %e,
                    "Check failed, rerunning after delay"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
