//! Retry controller: the only component that decides whether to try again.
//!
//! ```text
//!            start
//!   Idle ───────────► Attempting ──► run_attempt()
//!    ▲                     │
//!    │  wait (poll/backoff)│
//!    └─────────────────────┤  NotAvailableYet / TransientError (continuous)
//!                          │
//!                          ├─ Success ─────────────────────► Done
//!                          ├─ FatalError ──────────────────► Failed
//!                          ├─ any non-success in `once` ───► Failed
//!                          ├─ max attempts reached ────────► Failed
//!                          └─ too many errors in a row ────► Failed
//! ```

pub mod policy;

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{info, warn, Instrument};

use crate::attempt::{AttemptOutcome, AttemptRunner, Booking};
use crate::config::{RunConfig, RunMode};
use crate::interrupt::CancelToken;

pub use policy::RetryPolicy;

/// Attempt records kept for the report; older ones only count.
pub const HISTORY_LIMIT: usize = 10;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    /// Not running an attempt; either not started or waiting to retry.
    #[default]
    Idle,
    /// An attempt is in progress.
    Attempting,
    /// A booking attempt succeeded.
    Done,
    /// Gave up, hit a fatal error, or was interrupted.
    Failed,
}

impl ControllerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ControllerState::Done | ControllerState::Failed)
    }
}

/// One attempt as seen by the controller.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Local>,
    pub outcome: AttemptOutcome,
    /// Wait scheduled after this attempt, if the controller retried.
    pub wait: Option<Duration>,
}

/// Final result of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: RunMode,
    pub state: ControllerState,
    pub attempts: u32,
    /// The most recent attempts, oldest first, at most [`HISTORY_LIMIT`].
    pub history: VecDeque<AttemptRecord>,
    /// Number of waits between attempts.
    pub waits: u32,
    pub total_wait: Duration,
    /// Why the run failed; `None` on success.
    pub reason: Option<String>,
    pub booking: Option<Booking>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.state == ControllerState::Done
    }

    /// Attempts that are counted but no longer in `history`.
    pub fn earlier_attempts(&self) -> u32 {
        self.attempts.saturating_sub(self.history.len() as u32)
    }
}

/// Bounded attempt log plus running totals.
#[derive(Debug, Default)]
struct History {
    records: VecDeque<AttemptRecord>,
    waits: u32,
    total_wait: Duration,
}

impl History {
    fn push(&mut self, record: AttemptRecord) {
        if let Some(wait) = record.wait {
            self.waits += 1;
            self.total_wait += wait;
        }
        if self.records.len() == HISTORY_LIMIT {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }
}

/// What to do after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Decision {
    Finish(ControllerState, Option<String>),
    Wait(Duration),
}

/// Drives an [`AttemptRunner`] according to a [`RunConfig`].
pub struct RetryController {
    config: RunConfig,
    cancel: CancelToken,
    state: ControllerState,
    attempts: u32,
    consecutive_errors: u32,
}

impl RetryController {
    pub fn new(config: RunConfig, cancel: CancelToken) -> Self {
        Self {
            config,
            cancel,
            state: ControllerState::Idle,
            attempts: 0,
            consecutive_errors: 0,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run attempts until a terminal state is reached.
    pub async fn run<R: AttemptRunner + ?Sized>(&mut self, runner: &mut R) -> RunReport {
        let mut history = History::default();

        info!(
            mode = %self.config.mode,
            dry_run = self.config.dry_run,
            max_attempts = ?self.config.max_attempts,
            interval_secs = self.config.policy.poll_interval.as_secs(),
            "Starting booking run"
        );

        loop {
            if self.cancel.is_cancelled() {
                return self.finish(history, Some("interrupted by user".to_string()));
            }

            self.state = ControllerState::Attempting;
            self.attempts += 1;
            let attempt = self.attempts;
            let started_at = Local::now();

            let outcome = runner
                .run_attempt(attempt)
                .instrument(tracing::info_span!("attempt", n = attempt))
                .await;

            let decision = self.decide(&outcome);
            self.log_outcome(attempt, &outcome, &decision);

            let wait = match &decision {
                Decision::Wait(delay) => Some(*delay),
                Decision::Finish(..) => None,
            };
            history.push(AttemptRecord {
                attempt,
                started_at,
                outcome,
                wait,
            });

            match decision {
                Decision::Finish(state, reason) => {
                    self.state = state;
                    return self.finish(history, reason);
                }
                Decision::Wait(delay) => {
                    self.state = ControllerState::Idle;
                    let interrupted = tokio::select! {
                        _ = tokio::time::sleep(delay) => false,
                        _ = self.cancel.cancelled() => true,
                    };
                    if interrupted {
                        return self.finish(
                            history,
                            Some("interrupted by user while waiting".to_string()),
                        );
                    }
                }
            }
        }
    }

    /// Apply the transition rules to one outcome.
    fn decide(&mut self, outcome: &AttemptOutcome) -> Decision {
        let is_error = match outcome {
            AttemptOutcome::Success(_) => return Decision::Finish(ControllerState::Done, None),
            AttemptOutcome::FatalError(reason) => {
                return Decision::Finish(ControllerState::Failed, Some(reason.clone()))
            }
            AttemptOutcome::NotAvailableYet => false,
            AttemptOutcome::TransientError(_) => true,
        };

        if self.config.mode == RunMode::Once {
            return Decision::Finish(ControllerState::Failed, Some(outcome.to_string()));
        }

        if is_error {
            self.consecutive_errors += 1;
        } else {
            self.consecutive_errors = 0;
        }

        if let Some(max) = self.config.max_attempts {
            if self.attempts >= max {
                return Decision::Finish(
                    ControllerState::Failed,
                    Some(format!(
                        "gave up after {} attempts; last outcome: {}",
                        self.attempts, outcome
                    )),
                );
            }
        }

        let policy = &self.config.policy;
        if is_error && policy.error_limit_reached(self.consecutive_errors) {
            return Decision::Finish(
                ControllerState::Failed,
                Some(format!(
                    "{} errors in a row; last: {}",
                    self.consecutive_errors, outcome
                )),
            );
        }

        let delay = if is_error {
            policy.error_delay(self.consecutive_errors)
        } else {
            policy.poll_delay()
        };
        Decision::Wait(delay)
    }

    fn log_outcome(&self, attempt: u32, outcome: &AttemptOutcome, decision: &Decision) {
        match (outcome, decision) {
            (AttemptOutcome::Success(booking), _) => {
                info!(attempt, %booking, "Attempt completed successfully")
            }
            (AttemptOutcome::NotAvailableYet, Decision::Wait(delay)) => info!(
                attempt,
                wait_secs = delay.as_secs(),
                "No slot available yet; polling again"
            ),
            (AttemptOutcome::TransientError(reason), Decision::Wait(delay)) => warn!(
                attempt,
                consecutive = self.consecutive_errors,
                wait_secs = delay.as_secs(),
                %reason,
                "Attempt failed; backing off"
            ),
            (_, Decision::Finish(_, reason)) => warn!(
                attempt,
                outcome = outcome.kind(),
                reason = reason.as_deref().unwrap_or_default(),
                "Stopping"
            ),
            (AttemptOutcome::FatalError(_), Decision::Wait(_)) => {}
        }
    }

    fn finish(&mut self, history: History, reason: Option<String>) -> RunReport {
        // Interrupted between or before attempts.
        if !self.state.is_terminal() {
            self.state = ControllerState::Failed;
        }
        // Success always ends the run, so it can only be the last record.
        let booking = history.records.back().and_then(|r| match &r.outcome {
            AttemptOutcome::Success(b) => Some(b.clone()),
            _ => None,
        });

        RunReport {
            mode: self.config.mode,
            state: self.state,
            attempts: self.attempts,
            history: history.records,
            waits: history.waits,
            total_wait: history.total_wait,
            reason,
            booking,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_config(mode: RunMode, max_attempts: Option<u32>, error_limit: u32) -> RunConfig {
        RunConfig {
            mode,
            max_attempts,
            dry_run: true,
            policy: RetryPolicy::new(Duration::from_secs(30), Duration::from_secs(600), 0)
                .with_max_consecutive_errors(error_limit),
        }
    }

    fn controller(mode: RunMode, max_attempts: Option<u32>) -> RetryController {
        RetryController::new(run_config(mode, max_attempts, 0), CancelToken::never())
    }

    fn transient() -> AttemptOutcome {
        AttemptOutcome::TransientError("boom".to_string())
    }

    #[test]
    fn test_initial_state() {
        let c = controller(RunMode::Continuous, None);
        assert_eq!(c.state(), ControllerState::Idle);
        assert_eq!(c.attempts(), 0);
    }

    #[test]
    fn test_once_mode_never_waits() {
        let mut c = controller(RunMode::Once, None);
        c.attempts = 1;
        assert!(matches!(
            c.decide(&AttemptOutcome::NotAvailableYet),
            Decision::Finish(ControllerState::Failed, Some(_))
        ));
        assert!(matches!(
            c.decide(&transient()),
            Decision::Finish(ControllerState::Failed, Some(_))
        ));
    }

    #[test]
    fn test_not_available_waits_poll_interval() {
        let mut c = controller(RunMode::Continuous, None);
        c.attempts = 1;
        assert_eq!(
            c.decide(&AttemptOutcome::NotAvailableYet),
            Decision::Wait(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_transient_errors_back_off_and_reset() {
        let mut c = controller(RunMode::Continuous, None);
        c.attempts = 1;
        assert_eq!(c.decide(&transient()), Decision::Wait(Duration::from_secs(30)));
        assert_eq!(c.decide(&transient()), Decision::Wait(Duration::from_secs(60)));
        assert_eq!(c.decide(&transient()), Decision::Wait(Duration::from_secs(120)));

        c.decide(&AttemptOutcome::NotAvailableYet);
        assert_eq!(c.consecutive_errors, 0);
        assert_eq!(c.decide(&transient()), Decision::Wait(Duration::from_secs(30)));
    }

    #[test]
    fn test_consecutive_error_limit() {
        let mut c = RetryController::new(
            run_config(RunMode::Continuous, None, 2),
            CancelToken::never(),
        );
        c.attempts = 1;
        assert!(matches!(c.decide(&transient()), Decision::Wait(_)));
        assert!(matches!(
            c.decide(&transient()),
            Decision::Finish(ControllerState::Failed, Some(_))
        ));
    }

    #[test]
    fn test_history_is_bounded_but_totals_are_not() {
        let mut history = History::default();
        for attempt in 1..=25 {
            history.push(AttemptRecord {
                attempt,
                started_at: Local::now(),
                outcome: AttemptOutcome::NotAvailableYet,
                wait: Some(Duration::from_secs(30)),
            });
        }

        assert_eq!(history.records.len(), HISTORY_LIMIT);
        assert_eq!(history.records.front().map(|r| r.attempt), Some(16));
        assert_eq!(history.records.back().map(|r| r.attempt), Some(25));
        assert_eq!(history.waits, 25);
        assert_eq!(history.total_wait, Duration::from_secs(25 * 30));
    }

    #[test]
    fn test_max_attempts_checked_after_increment() {
        let mut c = controller(RunMode::Continuous, Some(2));
        c.attempts = 1;
        assert!(matches!(
            c.decide(&AttemptOutcome::NotAvailableYet),
            Decision::Wait(_)
        ));
        c.attempts = 2;
        assert!(matches!(
            c.decide(&AttemptOutcome::NotAvailableYet),
            Decision::Finish(ControllerState::Failed, Some(_))
        ));
    }
}
