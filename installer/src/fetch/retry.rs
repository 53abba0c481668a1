//! Retry and backoff policy for fetches.
//!
//! Transient failures are retried with exponential backoff up to a bounded
//! number of retries; permanent failures are returned immediately.

use super::{FetchError, FetchResult, Fetcher};
use crate::cancel::CancellationToken;
use crate::error::{InstallerError, Result};
use log::warn;
use std::time::Duration;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy with a retry bound and a delay cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each later retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Decide whether to retry after `attempt` (1-based) failed with `err`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use pinstall::fetch::{FetchError, RetryDecision, RetryPolicy};
    ///
    /// let policy = RetryPolicy::default();
    /// let timeout = FetchError::Timeout { url: "https://example.com".to_owned() };
    /// assert_eq!(
    ///     policy.decide(1, &timeout),
    ///     RetryDecision::RetryAfter(Duration::from_millis(250)),
    /// );
    /// assert_eq!(policy.decide(4, &timeout), RetryDecision::NoRetry);
    /// ```
    #[must_use]
    pub fn decide(&self, attempt: u32, err: &FetchError) -> RetryDecision {
        if attempt > self.max_retries || !err.is_transient() {
            return RetryDecision::NoRetry;
        }
        let exp = 1u32 << attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
        RetryDecision::RetryAfter(delay)
    }
}

/// Fetch `url`, retrying transient failures as `policy` allows.
///
/// `cancellation` is checked before every attempt and after every backoff
/// delay.
///
/// # Errors
///
/// Returns [`InstallerError::FetchFailed`] carrying the last error and the
/// number of attempts made once the policy gives up, or
/// [`InstallerError::Cancelled`] as soon as cancellation is observed.
pub fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    policy: &RetryPolicy,
    cancellation: &CancellationToken,
    url: &str,
) -> Result<FetchResult> {
    let mut attempt = 1u32;
    loop {
        if cancellation.is_cancelled() {
            return Err(InstallerError::Cancelled);
        }
        match fetcher.fetch(url) {
            Ok(result) => return Ok(result),
            Err(err) => match policy.decide(attempt, &err) {
                RetryDecision::NoRetry => {
                    return Err(InstallerError::FetchFailed {
                        url: url.to_owned(),
                        attempts: attempt,
                        source: err,
                    });
                }
                RetryDecision::RetryAfter(delay) => {
                    warn!("attempt {attempt} for {url} failed ({err}); retrying in {delay:?}");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            },
        }
    }
}
