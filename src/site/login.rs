//! Login: mobile number, OTP request, then a bounded wait for the user.
//!
//! The bot never reads or types the OTP. After requesting it, the attempt
//! blocks until the browser leaves the login page (the user typed the code
//! and submitted), the OTP wait elapses, or the run is interrupted.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use super::actions::{click_first, is_login_url, pause, wait_for_element};
use crate::config::BotConfig;
use crate::error::{Step, StepError};
use crate::interrupt::CancelToken;
use crate::webdriver::Page;

const OTP_POLL: Duration = Duration::from_secs(1);

/// How the OTP pause ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpWait {
    /// The browser left the login page.
    Completed,
    /// The wait elapsed while still on the login page.
    TimedOut,
}

/// Run the whole login step.
///
/// An OTP timeout is only a warning: the booking page check that follows
/// reports a redirect back to login as a transient error.
pub async fn log_in<P: Page + ?Sized>(
    page: &P,
    config: &BotConfig,
    cancel: &CancelToken,
) -> Result<(), StepError> {
    let selectors = &config.selectors;
    let timeout = config.step_timeout();

    info!(url = %config.login_url, "Opening login page");
    page.goto(&config.login_url)
        .await
        .map_err(StepError::driver(Step::Login))?;

    let input = wait_for_element(
        page,
        &selectors.mobile_input,
        timeout,
        true,
        cancel,
        Step::Login,
    )
    .await?;
    page.click(&input)
        .await
        .map_err(StepError::driver(Step::Login))?;
    page.send_keys(&input, config.mobile_number.trim())
        .await
        .map_err(StepError::driver(Step::Login))?;

    info!(mobile = %config.masked_mobile(), "Entered mobile number; requesting OTP");
    click_first(page, &selectors.get_otp, timeout, cancel, Step::Login).await?;

    info!(
        wait_secs = config.otp_wait_seconds,
        "Enter the OTP in the browser window; waiting for login to complete"
    );
    match wait_for_otp(page, &config.login_url, config.otp_wait(), cancel).await? {
        OtpWait::Completed => info!("Login completed (left login page)"),
        OtpWait::TimedOut => warn!(
            wait_secs = config.otp_wait_seconds,
            "OTP wait timed out; continuing, the booking page may redirect to login"
        ),
    }
    Ok(())
}

/// Block until the browser leaves `login_url`, or `timeout`.
pub async fn wait_for_otp<P: Page + ?Sized>(
    page: &P,
    login_url: &str,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<OtpWait, StepError> {
    let deadline = Instant::now() + timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled { step: Step::Login });
        }

        let url = page
            .current_url()
            .await
            .map_err(StepError::driver(Step::Login))?;
        if !is_login_url(&url, login_url) {
            return Ok(OtpWait::Completed);
        }

        if Instant::now() >= deadline {
            return Ok(OtpWait::TimedOut);
        }
        pause(OTP_POLL, cancel, Step::Login).await?;
    }
}
