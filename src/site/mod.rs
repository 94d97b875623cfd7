//! Site action steps for the booking portal.
//!
//! Each method on [`BookingFlow`] is one named step. Steps never decide
//! whether to retry; they only report what happened as a [`StepError`].

pub mod actions;
pub mod login;

use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::error::{Step, StepError};
use crate::interrupt::CancelToken;
use crate::webdriver::Page;

use actions::{click_first, element_label, is_login_url, wait_for_any};

pub use login::{wait_for_otp, OtpWait};

/// The steps of one attempt, bound to an open page.
pub struct BookingFlow<'a, P: Page + ?Sized> {
    page: &'a P,
    config: &'a BotConfig,
    cancel: &'a CancelToken,
}

impl<'a, P: Page + ?Sized> BookingFlow<'a, P> {
    pub fn new(page: &'a P, config: &'a BotConfig, cancel: &'a CancelToken) -> Self {
        Self {
            page,
            config,
            cancel,
        }
    }

    pub async fn log_in(&self) -> Result<(), StepError> {
        login::log_in(self.page, self.config, self.cancel).await
    }

    /// Navigate to the booking page and check we were not bounced to login.
    pub async fn open_booking_page(&self) -> Result<(), StepError> {
        let step = Step::OpenBookingPage;
        self.check_cancel(step)?;

        info!(url = %self.config.booking_url, "Opening booking page");
        self.page
            .goto(&self.config.booking_url)
            .await
            .map_err(StepError::driver(step))?;
        self.ensure_not_on_login(step).await
    }

    /// Open the date picker and click the first enabled date.
    ///
    /// Returns the label of the chosen date. No enabled date within the step
    /// timeout, while still on the booking page, is [`StepError::Unavailable`].
    pub async fn pick_date(&self) -> Result<String, StepError> {
        let step = Step::PickDate;
        self.check_cancel(step)?;
        let selectors = &self.config.selectors;

        // Some layouts render the calendar inline, so failing to open it is
        // not an error by itself.
        match click_first(
            self.page,
            &selectors.open_calendar,
            self.config.step_timeout(),
            self.cancel,
            step,
        )
        .await
        {
            Ok(_) => debug!("Date picker opened"),
            Err(e @ StepError::Cancelled { .. }) => return Err(e),
            Err(e) => warn!(error = %e, "Could not open date picker"),
        }

        let dates = wait_for_any(
            self.page,
            &selectors.enabled_date,
            self.config.step_timeout(),
            self.cancel,
            step,
        )
        .await?;
        let Some(first) = dates.first() else {
            self.ensure_not_on_login(step).await?;
            info!("No available date is visible");
            return Err(StepError::Unavailable { step, what: "date" });
        };

        let label = element_label(self.page, first, "unknown-date", step).await?;
        self.page
            .click(first)
            .await
            .map_err(StepError::driver(step))?;
        info!(date = %label, candidates = dates.len(), "Selected next available date");
        Ok(label)
    }

    /// Click the first open time slot, when a slot selector is configured.
    ///
    /// Slots usually render a moment after the date click, so the list is
    /// polled for up to the step timeout before it counts as empty.
    pub async fn pick_slot(&self) -> Result<Option<String>, StepError> {
        let step = Step::PickSlot;
        let Some(slot_selectors) = &self.config.selectors.slot else {
            return Ok(None);
        };
        self.check_cancel(step)?;

        let slots = wait_for_any(
            self.page,
            slot_selectors,
            self.config.step_timeout(),
            self.cancel,
            step,
        )
        .await?;
        let Some(first) = slots.first() else {
            self.ensure_not_on_login(step).await?;
            info!("Date has no open time slot");
            return Err(StepError::Unavailable {
                step,
                what: "time slot",
            });
        };

        let label = element_label(self.page, first, "unknown-slot", step).await?;
        self.page
            .click(first)
            .await
            .map_err(StepError::driver(step))?;
        info!(slot = %label, "Selected time slot");
        Ok(Some(label))
    }

    /// The irreversible booking click.
    pub async fn confirm(&self) -> Result<(), StepError> {
        let step = Step::Confirm;
        self.check_cancel(step)?;

        click_first(
            self.page,
            &self.config.selectors.proceed,
            self.config.step_timeout(),
            self.cancel,
            step,
        )
        .await?;
        info!("Clicked booking/proceed button; complete captcha/OTP/manual details if prompted");
        Ok(())
    }

    fn check_cancel(&self, step: Step) -> Result<(), StepError> {
        if self.cancel.is_cancelled() {
            Err(StepError::Cancelled { step })
        } else {
            Ok(())
        }
    }

    async fn ensure_not_on_login(&self, step: Step) -> Result<(), StepError> {
        let url = self
            .page
            .current_url()
            .await
            .map_err(StepError::driver(step))?;
        if is_login_url(&url, &self.config.login_url) {
            return Err(StepError::LoginRequired { step, url });
        }
        Ok(())
    }
}
