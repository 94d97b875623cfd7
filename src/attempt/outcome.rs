use std::fmt;

/// What a successful attempt selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    /// Label of the chosen date
    pub date: String,
    /// Label of the chosen time slot, when the flow picks one
    pub slot: Option<String>,
    /// Whether the final confirmation was clicked (false in dry run)
    pub confirmed: bool,
}

impl fmt::Display for Booking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date)?;
        if let Some(slot) = &self.slot {
            write!(f, " at {}", slot)?;
        }
        if !self.confirmed {
            write!(f, " (dry run, not confirmed)")?;
        }
        Ok(())
    }
}

/// Result of one pass through the booking steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Every step ran; in dry run this means "would have booked".
    Success(Booking),
    /// The booking page was reached but nothing could be selected.
    NotAvailableYet,
    /// Unexpected page state or transport failure; may clear up later.
    TransientError(String),
    /// Must not be retried.
    FatalError(String),
}

impl AttemptOutcome {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::NotAvailableYet => "not_available_yet",
            AttemptOutcome::TransientError(_) => "transient_error",
            AttemptOutcome::FatalError(_) => "fatal_error",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Success(booking) => write!(f, "booked {}", booking),
            AttemptOutcome::NotAvailableYet => write!(f, "no slot available yet"),
            AttemptOutcome::TransientError(reason) => write!(f, "transient error: {}", reason),
            AttemptOutcome::FatalError(reason) => write!(f, "fatal error: {}", reason),
        }
    }
}
