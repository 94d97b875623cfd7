//! Attempt runner: one full pass through the booking steps.
//!
//! Each attempt opens a fresh browser session, runs login, navigation, date
//! and slot selection and (unless dry run) the confirmation, then closes the
//! session whatever happened. The session is never reused across attempts,
//! so a retried attempt always starts from a clean login.

mod outcome;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::error::{classify, Step, StepError};
use crate::interrupt::CancelToken;
use crate::site::BookingFlow;
use crate::webdriver::{BrowserLauncher, Page};

pub use outcome::{AttemptOutcome, Booking};

/// Something that can make one booking attempt.
///
/// Takes `&mut self` so attempts against the same runner are serialized.
#[async_trait]
pub trait AttemptRunner: Send {
    async fn run_attempt(&mut self, attempt: u32) -> AttemptOutcome;
}

/// The real runner, driving a browser through [`BookingFlow`].
pub struct BookingAttempt<L: BrowserLauncher> {
    launcher: L,
    config: BotConfig,
    cancel: CancelToken,
}

impl<L: BrowserLauncher> BookingAttempt<L> {
    pub fn new(launcher: L, config: BotConfig, cancel: CancelToken) -> Self {
        Self {
            launcher,
            config,
            cancel,
        }
    }

    async fn run_steps(&self, page: &L::Page) -> Result<Booking, StepError> {
        let flow = BookingFlow::new(page, &self.config, &self.cancel);

        flow.log_in().await?;
        flow.open_booking_page().await?;
        let date = flow.pick_date().await?;
        let slot = flow.pick_slot().await?;

        if self.config.dry_run {
            info!("Dry run enabled; stopping before final booking action");
            return Ok(Booking {
                date,
                slot,
                confirmed: false,
            });
        }

        flow.confirm().await?;
        Ok(Booking {
            date,
            slot,
            confirmed: true,
        })
    }
}

#[async_trait]
impl<L: BrowserLauncher> AttemptRunner for BookingAttempt<L> {
    async fn run_attempt(&mut self, attempt: u32) -> AttemptOutcome {
        if self.cancel.is_cancelled() {
            return classify(&StepError::Cancelled { step: Step::Launch });
        }

        let page = match self.launcher.launch().await {
            Ok(page) => page,
            Err(e) => return classify(&StepError::driver(Step::Launch)(e)),
        };

        let result = self.run_steps(&page).await;

        if let Err(e) = page.close().await {
            warn!(attempt, error = %e, "Failed to close browser session");
        }

        match result {
            Ok(booking) => AttemptOutcome::Success(booking),
            Err(e) => {
                debug!(attempt, step = %e.step(), error = %e, "Attempt stopped early");
                classify(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::config::SelectorList;
    use crate::interrupt::Interrupt;
    use crate::site::testing::{FakePage, FakeState};
    use crate::webdriver::{DriverError, DriverResult, ElementRef};

    const LOGIN: &str = "https://portal.test/login";
    const BOOKING: &str = "https://portal.test/booking";

    /// Hands out a shared fake page and counts launches.
    struct FakeLauncher {
        page: Arc<FakePage>,
        launches: AtomicU32,
        fail_launch: bool,
    }

    struct SharedPage(Arc<FakePage>);

    #[async_trait]
    impl Page for SharedPage {
        async fn goto(&self, url: &str) -> DriverResult<()> {
            self.0.goto(url).await
        }
        async fn current_url(&self) -> DriverResult<String> {
            self.0.current_url().await
        }
        async fn find_all(
            &self,
            locator: &crate::config::Locator,
        ) -> DriverResult<Vec<ElementRef>> {
            self.0.find_all(locator).await
        }
        async fn click(&self, element: &ElementRef) -> DriverResult<()> {
            self.0.click(element).await
        }
        async fn send_keys(&self, element: &ElementRef, text: &str) -> DriverResult<()> {
            self.0.send_keys(element, text).await
        }
        async fn text(&self, element: &ElementRef) -> DriverResult<String> {
            self.0.text(element).await
        }
        async fn attribute(
            &self,
            element: &ElementRef,
            name: &str,
        ) -> DriverResult<Option<String>> {
            self.0.attribute(element, name).await
        }
        async fn is_displayed(&self, element: &ElementRef) -> DriverResult<bool> {
            self.0.is_displayed(element).await
        }
        async fn close(&self) -> DriverResult<()> {
            self.0.close().await
        }
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        type Page = SharedPage;

        async fn launch(&self) -> DriverResult<SharedPage> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            if self.fail_launch {
                return Err(DriverError::Command {
                    error: "session not created".to_string(),
                    message: "chrome not reachable".to_string(),
                });
            }
            Ok(SharedPage(Arc::clone(&self.page)))
        }
    }

    fn config(dry_run: bool) -> BotConfig {
        let mut config = BotConfig {
            mobile_number: "9876543210".to_string(),
            login_url: LOGIN.to_string(),
            booking_url: BOOKING.to_string(),
            timeout_ms: 500,
            otp_wait_seconds: 2,
            dry_run,
            ..BotConfig::default()
        };
        config.selectors.mobile_input = SelectorList::parse("#mobile");
        config.selectors.get_otp = SelectorList::parse("#otp");
        config.selectors.open_calendar = SelectorList::parse("#calendar");
        config.selectors.enabled_date = SelectorList::parse(".free-date");
        config.selectors.proceed = SelectorList::parse("#book");
        config
    }

    fn bookable_page(with_dates: bool) -> FakePage {
        let mut elements = HashMap::new();
        elements.insert("#mobile".to_string(), vec![ElementRef("m".into())]);
        elements.insert("#otp".to_string(), vec![ElementRef("otp".into())]);
        elements.insert("#calendar".to_string(), vec![ElementRef("cal".into())]);
        elements.insert("#book".to_string(), vec![ElementRef("book".into())]);
        if with_dates {
            elements.insert(".free-date".to_string(), vec![ElementRef("d1".into())]);
        }
        let mut texts = HashMap::new();
        texts.insert("d1".to_string(), "21".to_string());

        FakePage::with(FakeState {
            elements,
            texts,
            otp_button: Some("otp".to_string()),
            after_otp: Some("https://portal.test/home".to_string()),
            ..FakeState::default()
        })
    }

    fn launcher(page: FakePage) -> FakeLauncher {
        FakeLauncher {
            page: Arc::new(page),
            launches: AtomicU32::new(0),
            fail_launch: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_never_clicks_confirm() {
        let launcher = launcher(bookable_page(true));
        let page = Arc::clone(&launcher.page);
        let mut runner = BookingAttempt::new(launcher, config(true), CancelToken::never());

        let outcome = runner.run_attempt(1).await;

        assert_eq!(
            outcome,
            AttemptOutcome::Success(Booking {
                date: "21".to_string(),
                slot: None,
                confirmed: false,
            })
        );
        assert!(!page.clicks().contains(&"book".to_string()));
        assert_eq!(page.state.lock().unwrap().closed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_clicks_confirm_exactly_once_last() {
        let launcher = launcher(bookable_page(true));
        let page = Arc::clone(&launcher.page);
        let mut runner = BookingAttempt::new(launcher, config(false), CancelToken::never());

        let outcome = runner.run_attempt(1).await;

        assert!(matches!(
            outcome,
            AttemptOutcome::Success(Booking {
                confirmed: true,
                ..
            })
        ));
        let clicks = page.clicks();
        assert_eq!(clicks.iter().filter(|c| *c == "book").count(), 1);
        assert_eq!(clicks.last().map(String::as_str), Some("book"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_dates_is_not_available_and_skips_confirm() {
        let launcher = launcher(bookable_page(false));
        let page = Arc::clone(&launcher.page);
        let mut runner = BookingAttempt::new(launcher, config(false), CancelToken::never());

        let outcome = runner.run_attempt(1).await;

        assert_eq!(outcome, AttemptOutcome::NotAvailableYet);
        assert!(!page.clicks().contains(&"book".to_string()));
        assert_eq!(page.state.lock().unwrap().closed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_layout_change_is_transient_and_session_closed() {
        let launcher = launcher(FakePage::default());
        let page = Arc::clone(&launcher.page);
        let mut runner = BookingAttempt::new(launcher, config(false), CancelToken::never());

        let outcome = runner.run_attempt(1).await;

        assert!(matches!(outcome, AttemptOutcome::TransientError(_)));
        assert_eq!(page.state.lock().unwrap().closed, 1);
    }

    #[tokio::test]
    async fn test_launch_failure_is_transient() {
        let mut launcher = launcher(FakePage::default());
        launcher.fail_launch = true;
        let mut runner = BookingAttempt::new(launcher, config(true), CancelToken::never());

        match runner.run_attempt(1).await {
            AttemptOutcome::TransientError(reason) => {
                assert!(reason.contains("launch browser"));
                assert!(reason.contains("session not created"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_launch_is_fatal() {
        let launcher = launcher(FakePage::default());
        let interrupt = Interrupt::new();
        interrupt.trigger();
        let mut runner = BookingAttempt::new(launcher, config(true), interrupt.token());

        let outcome = runner.run_attempt(1).await;

        assert!(matches!(outcome, AttemptOutcome::FatalError(_)));
        assert_eq!(runner.launcher.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_attempt_opens_a_fresh_session() {
        let launcher = launcher(bookable_page(false));
        let page = Arc::clone(&launcher.page);
        let mut runner = BookingAttempt::new(launcher, config(true), CancelToken::never());

        runner.run_attempt(1).await;
        runner.run_attempt(2).await;

        assert_eq!(runner.launcher.launches.load(Ordering::SeqCst), 2);
        assert_eq!(page.state.lock().unwrap().closed, 2);
    }
}
