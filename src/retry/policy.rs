//! Wait-time policy between attempts.
//!
//! Two kinds of waits exist:
//!
//! - after `NotAvailableYet`, the plain poll interval;
//! - after `TransientError`, `interval * 2^(n - 1)` for the n-th error in a
//!   row, capped at `max_backoff`.
//!
//! Both are spread by `jitter_percent` in either direction so the polling does
//! not hit the site on an exact cadence.

use std::time::Duration;

use rand::Rng;

/// Delay and give-up rules used by the retry controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after an attempt that found no slot.
    pub poll_interval: Duration,
    /// Upper bound for any wait.
    pub max_backoff: Duration,
    /// Spread applied to each wait, as a percentage (0-100).
    pub jitter_percent: u8,
    /// Transient errors in a row that end the run; `None` never gives up.
    pub max_consecutive_errors: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            max_backoff: Duration::from_secs(1800),
            jitter_percent: 10,
            max_consecutive_errors: Some(5),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with no consecutive-error limit.
    pub fn new(poll_interval: Duration, max_backoff: Duration, jitter_percent: u8) -> Self {
        Self {
            poll_interval,
            max_backoff: max_backoff.max(poll_interval),
            jitter_percent: jitter_percent.min(100),
            max_consecutive_errors: None,
        }
    }

    /// Sets the consecutive transient error limit (0 disables it).
    pub fn with_max_consecutive_errors(mut self, limit: u32) -> Self {
        self.max_consecutive_errors = (limit > 0).then_some(limit);
        self
    }

    /// Wait before the next poll after `NotAvailableYet`.
    pub fn poll_delay(&self) -> Duration {
        self.jittered(self.poll_interval)
    }

    /// Wait after the `consecutive_errors`-th transient error in a row.
    pub fn error_delay(&self, consecutive_errors: u32) -> Duration {
        self.jittered(self.base_error_delay(consecutive_errors))
    }

    /// Un-jittered backoff: `poll_interval * 2^(n - 1)`, capped at `max_backoff`.
    pub fn base_error_delay(&self, consecutive_errors: u32) -> Duration {
        let exponent = consecutive_errors.saturating_sub(1).min(31);
        let millis = (self.poll_interval.as_millis() as u64).saturating_mul(1u64 << exponent);
        Duration::from_millis(millis).min(self.max_backoff)
    }

    /// Whether this many transient errors in a row should end the run.
    pub fn error_limit_reached(&self, consecutive_errors: u32) -> bool {
        self.max_consecutive_errors
            .is_some_and(|limit| consecutive_errors >= limit)
    }

    /// Spread `base` uniformly over `base ± jitter_percent%`, never above
    /// `max_backoff`.
    fn jittered(&self, base: Duration) -> Duration {
        let base_ms = base.as_millis() as u64;
        let spread = base_ms.saturating_mul(u64::from(self.jitter_percent)) / 100;
        if spread == 0 {
            return base.min(self.max_backoff);
        }

        let low = base_ms - spread;
        let high = base_ms.saturating_add(spread);
        let ms = rand::rng().random_range(low..=high);
        Duration::from_millis(ms).min(self.max_backoff)
    }
}
