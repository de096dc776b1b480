//! # Rate-limit bookkeeping
//!
//! The service limits how many data points an account may write per minute
//! and reports the current state two ways: `X-RateLimit-*` and `Retry-After`
//! headers on REST responses, and text notices on the `<user>/throttle`
//! topic. [`ThrottleTracker`] folds both into a local budget that is consulted
//! before every REST request, so a device that is known to be over its limit
//! fails fast instead of spending a round trip on a guaranteed 429.
//!
//! The budget is advisory. The service stays the authority: a 429 that the
//! tracker did not predict resynchronises it.

use super::error::Error;
use super::model::RateInfo;
use crate::network::application::http::Response;

/// Wait assumed when the service throttles without saying for how long.
pub const DEFAULT_RETRY_AFTER_SECS: u32 = 60;

/// Length of the service's rate window, used when a budget is learned
/// without a reset time.
const WINDOW_MS: u64 = 60_000;

/// Values of `X-RateLimit-Reset` at or above this are wall-clock epochs,
/// which a monotonic clock cannot place.
const EPOCH_THRESHOLD: u64 = 1_000_000_000;

/// Server feedback folded into the tracker.
#[derive(Debug, Clone, Copy)]
pub enum Feedback<'a> {
    /// A REST response: status plus rate-limit headers.
    Response(&'a Response),
    /// A notice from the throttle topic, with the retry hint it carried.
    Notice {
        /// Seconds until the service accepts data again, if stated.
        retry_after_secs: Option<u32>,
    },
}

/// Remaining request budget and when it refills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThrottleTracker {
    remaining: Option<u32>,
    limit: Option<u32>,
    reset_at_ms: Option<u64>,
}

impl ThrottleTracker {
    /// A tracker that knows nothing yet and therefore allows every request.
    pub const fn new() -> Self {
        Self {
            remaining: None,
            limit: None,
            reset_at_ms: None,
        }
    }

    /// Requests left before the reset, or `None` while unknown.
    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    /// Last limit the service reported.
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Clock time at which the budget refills.
    pub fn reset_at_ms(&self) -> Option<u64> {
        self.reset_at_ms
    }

    /// Milliseconds until the budget refills, 0 if no reset is pending.
    pub fn retry_after_ms(&self, now_ms: u64) -> u32 {
        self.reset_at_ms
            .map(|reset| clamp_ms(reset.saturating_sub(now_ms)))
            .unwrap_or(0)
    }

    /// Take one unit of budget for a request about to be sent.
    ///
    /// # Errors
    ///
    /// [`Error::Throttle`] if the budget is exhausted and the reset time has
    /// not passed. Nothing is consumed in that case.
    pub fn reserve(&mut self, now_ms: u64) -> Result<(), Error> {
        self.refresh(now_ms);
        match self.remaining {
            None => Ok(()),
            Some(0) => {
                let reset = *self.reset_at_ms.get_or_insert(now_ms + WINDOW_MS);
                let retry_after_ms = clamp_ms(reset.saturating_sub(now_ms));
                debug!("throttle: budget exhausted, {} ms to reset", retry_after_ms);
                Err(Error::Throttle { retry_after_ms })
            }
            Some(n) => {
                self.remaining = Some(n - 1);
                Ok(())
            }
        }
    }

    /// Update from server feedback.
    pub fn observe(&mut self, feedback: Feedback<'_>, now_ms: u64) {
        match feedback {
            Feedback::Response(response) => self.observe_response(response, now_ms),
            Feedback::Notice { retry_after_secs } => {
                let secs = retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                warn!("throttle: notice received, holding requests for {} s", secs);
                self.exhaust(secs, now_ms);
            }
        }
    }

    /// Seed the budget from the throttle endpoint.
    pub fn sync(&mut self, info: &RateInfo, now_ms: u64) {
        self.limit = Some(info.data_rate_limit);
        self.remaining = Some(info.remaining());
        self.reset_at_ms = Some(now_ms + WINDOW_MS);
        debug!(
            "throttle: synced to {} of {} remaining",
            info.remaining(),
            info.data_rate_limit
        );
    }

    fn observe_response(&mut self, response: &Response, now_ms: u64) {
        let number = |name: &str| -> Option<u64> { response.header(name)?.trim().parse().ok() };

        if let Some(limit) = number("X-RateLimit-Limit") {
            self.limit = u32::try_from(limit).ok();
        }
        if let Some(remaining) = number("X-RateLimit-Remaining") {
            self.remaining = Some(u32::try_from(remaining).unwrap_or(u32::MAX));
        }
        if let Some(reset) = number("X-RateLimit-Reset").filter(|r| *r < EPOCH_THRESHOLD) {
            self.reset_at_ms = Some(now_ms + reset * 1_000);
        }

        if response.status_code == 429 {
            let secs = number("Retry-After")
                .and_then(|s| u32::try_from(s).ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!("throttle: rejected by service, resyncing for {} s", secs);
            self.exhaust(secs, now_ms);
        }
    }

    fn exhaust(&mut self, secs: u32, now_ms: u64) {
        self.remaining = Some(0);
        self.reset_at_ms = Some(now_ms + u64::from(secs) * 1_000);
    }

    fn refresh(&mut self, now_ms: u64) {
        if self.reset_at_ms.is_some_and(|reset| now_ms >= reset) {
            self.remaining = self.limit;
            self.reset_at_ms = None;
        }
    }
}

fn clamp_ms(ms: u64) -> u32 {
    u32::try_from(ms).unwrap_or(u32::MAX)
}
