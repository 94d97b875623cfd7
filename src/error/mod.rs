//! Step failures and their classification into attempt outcomes.
//!
//! Every browser step reports failure as a [`StepError`] naming the step.
//! [`classify`] is the single place that decides whether a failure means
//! "no slot yet", "something went wrong, try later" or "stop now".

pub mod classification;

use std::fmt;

use thiserror::Error;

use crate::webdriver::DriverError;

pub use classification::classify;

/// The named steps of one booking attempt, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Opening a browser session
    Launch,
    /// Mobile number, OTP request and the manual OTP pause
    Login,
    /// Navigating to the booking page
    OpenBookingPage,
    /// Opening the calendar and choosing the first enabled date
    PickDate,
    /// Choosing the first open time slot
    PickSlot,
    /// The final, irreversible proceed/book click
    Confirm,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Launch => "launch browser",
            Step::Login => "log in",
            Step::OpenBookingPage => "open booking page",
            Step::PickDate => "pick date",
            Step::PickSlot => "pick slot",
            Step::Confirm => "confirm booking",
        };
        write!(f, "{}", name)
    }
}

/// Why a step did not complete.
#[derive(Debug, Error)]
pub enum StepError {
    /// The browser or WebDriver server reported an error.
    #[error("{step}: {source}")]
    Driver {
        step: Step,
        #[source]
        source: DriverError,
    },

    /// The booking page loaded but offered nothing to select.
    #[error("{step}: no {what} available")]
    Unavailable { step: Step, what: &'static str },

    /// The site sent us back to the login page.
    #[error("{step}: redirected to login page ({url})")]
    LoginRequired { step: Step, url: String },

    /// The user interrupted the run.
    #[error("{step}: interrupted by user")]
    Cancelled { step: Step },
}

impl StepError {
    /// Wraps a driver error with the step it happened in.
    pub fn driver(step: Step) -> impl FnOnce(DriverError) -> StepError {
        move |source| StepError::Driver { step, source }
    }

    pub fn step(&self) -> Step {
        match self {
            StepError::Driver { step, .. }
            | StepError::Unavailable { step, .. }
            | StepError::LoginRequired { step, .. }
            | StepError::Cancelled { step } => *step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_display() {
        assert_eq!(Step::PickDate.to_string(), "pick date");
        assert_eq!(Step::Confirm.to_string(), "confirm booking");
    }

    #[test]
    fn test_step_error_message_names_step() {
        let err = StepError::Unavailable {
            step: Step::PickSlot,
            what: "time slot",
        };
        assert_eq!(err.to_string(), "pick slot: no time slot available");
        assert_eq!(err.step(), Step::PickSlot);
    }

    #[test]
    fn test_driver_helper_wraps_source() {
        let err = StepError::driver(Step::Login)(DriverError::NoSuchElement("x".to_string()));
        assert_eq!(err.step(), Step::Login);
        assert!(err.to_string().starts_with("log in: no element matched"));
    }
}
