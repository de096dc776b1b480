//! # Retry policy
//!
//! Nothing in this crate retries a REST call on its own: whether repeating a
//! request is safe depends on the operation (creating a data point twice
//! creates two data points). [`RetryPolicy`] is the documented backoff
//! recommendation callers apply when they decide to retry, and the schedule
//! the messaging session follows when it (re)establishes its connection.

use super::error::Error;

/// Delay schedule between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Never try again.
    None,

    /// Wait the same amount of time before every retry.
    Linear {
        /// Delay between attempts, in milliseconds.
        delay_ms: u32,
        /// Number of retries after the first attempt.
        max_retry: u8,
    },

    /// Double the wait after every failed retry.
    Exponential {
        /// Delay before the first retry, in milliseconds.
        min_delay_ms: u32,
        /// Upper bound for any single delay, in milliseconds.
        max_delay_ms: u32,
        /// Number of retries after the first attempt.
        max_retry: u8,
    },
}

impl RetryPolicy {
    /// Number of retries allowed after the first attempt.
    pub fn max_retry(&self) -> u8 {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Linear { max_retry, .. } | RetryPolicy::Exponential { max_retry, .. } => {
                *max_retry
            }
        }
    }

    /// Whether retry number `attempt` (1-based) is past the limit.
    pub fn reached_max_retry(&self, attempt: u8) -> bool {
        attempt > self.max_retry()
    }

    /// Wait before retry number `attempt` (1-based), or `None` once the
    /// policy is exhausted.
    pub fn delay_ms(&self, attempt: u8) -> Option<u32> {
        if attempt == 0 || self.reached_max_retry(attempt) {
            return None;
        }
        match *self {
            RetryPolicy::None => None,
            RetryPolicy::Linear { delay_ms, .. } => Some(delay_ms),
            RetryPolicy::Exponential {
                min_delay_ms,
                max_delay_ms,
                ..
            } => {
                let factor = 1u32.checked_shl(u32::from(attempt - 1)).unwrap_or(u32::MAX);
                Some(min_delay_ms.saturating_mul(factor).min(max_delay_ms))
            }
        }
    }

    /// How long to wait before retrying a call that failed with `error`, or
    /// `None` if it should not be retried.
    ///
    /// Throttled calls wait at least as long as the service asked for.
    pub fn retry_delay(&self, attempt: u8, error: &Error) -> Option<u32> {
        if !error.is_retryable() {
            return None;
        }
        let backoff = self.delay_ms(attempt)?;
        match error {
            Error::Throttle { retry_after_ms } => Some(backoff.max(*retry_after_ms)),
            _ => Some(backoff),
        }
    }
}

impl Default for RetryPolicy {
    /// 1 s, 2 s, 4 s, 8 s, 16 s, then give up.
    fn default() -> Self {
        RetryPolicy::Exponential {
            min_delay_ms: 1_000,
            max_delay_ms: 32_000,
            max_retry: 5,
        }
    }
}
