//! Mapping from step failures to attempt outcomes.
//!
//! `NotAvailableYet` needs positive evidence: the booking page was reached
//! and the date (or slot) locator matched nothing. A missing element, a
//! timeout or a bounce to the login page is `TransientError`. Only user
//! interruption is `FatalError`; configuration problems are caught before
//! the first attempt.

use crate::attempt::AttemptOutcome;

use super::StepError;

/// Decide what a failed step means for the retry controller.
pub fn classify(error: &StepError) -> AttemptOutcome {
    match error {
        StepError::Unavailable { .. } => AttemptOutcome::NotAvailableYet,
        StepError::Cancelled { .. } => AttemptOutcome::FatalError(error.to_string()),
        StepError::Driver { .. } | StepError::LoginRequired { .. } => {
            AttemptOutcome::TransientError(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Step;
    use crate::webdriver::DriverError;

    #[test]
    fn test_unavailable_is_not_available_yet() {
        let err = StepError::Unavailable {
            step: Step::PickDate,
            what: "date",
        };
        assert_eq!(classify(&err), AttemptOutcome::NotAvailableYet);
    }

    #[test]
    fn test_missing_element_is_transient() {
        let err = StepError::Driver {
            step: Step::Login,
            source: DriverError::NoSuchElement("css `input`".to_string()),
        };
        assert!(matches!(classify(&err), AttemptOutcome::TransientError(_)));
    }

    #[test]
    fn test_timeout_is_transient() {
        let err = StepError::Driver {
            step: Step::OpenBookingPage,
            source: DriverError::Command {
                error: "timeout".to_string(),
                message: "page load timed out".to_string(),
            },
        };
        assert!(matches!(classify(&err), AttemptOutcome::TransientError(_)));
    }

    #[test]
    fn test_login_redirect_is_transient() {
        let err = StepError::LoginRequired {
            step: Step::OpenBookingPage,
            url: "https://example.test/login".to_string(),
        };
        match classify(&err) {
            AttemptOutcome::TransientError(reason) => assert!(reason.contains("login")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_cancel_is_fatal() {
        let err = StepError::Cancelled { step: Step::Login };
        match classify(&err) {
            AttemptOutcome::FatalError(reason) => assert!(reason.contains("interrupted")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
