//! Waiting and clicking helpers shared by the booking steps.

use std::time::Duration;

use reqwest::Url;
use tokio::time::Instant;

use crate::config::SelectorList;
use crate::error::{Step, StepError};
use crate::interrupt::CancelToken;
use crate::webdriver::{DriverError, ElementRef, Page};

/// How often element and URL conditions are re-checked.
pub const POLL_EVERY: Duration = Duration::from_millis(250);

/// Sleep for `duration` unless cancelled first.
pub async fn pause(duration: Duration, cancel: &CancelToken, step: Step) -> Result<(), StepError> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(StepError::Cancelled { step }),
    }
}

/// Elements matched by the first alternative that matches anything.
pub async fn find_any<P: Page + ?Sized>(
    page: &P,
    selectors: &SelectorList,
    step: Step,
) -> Result<Vec<ElementRef>, StepError> {
    for locator in selectors.iter() {
        let found = page
            .find_all(locator)
            .await
            .map_err(StepError::driver(step))?;
        if !found.is_empty() {
            tracing::trace!(%locator, count = found.len(), "selector matched");
            return Ok(found);
        }
    }
    Ok(Vec::new())
}

/// Poll [`find_any`] until it matches or `timeout` passes.
///
/// An empty result means nothing matched for the whole timeout.
pub async fn wait_for_any<P: Page + ?Sized>(
    page: &P,
    selectors: &SelectorList,
    timeout: Duration,
    cancel: &CancelToken,
    step: Step,
) -> Result<Vec<ElementRef>, StepError> {
    let deadline = Instant::now() + timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled { step });
        }

        let found = find_any(page, selectors, step).await?;
        if !found.is_empty() || Instant::now() >= deadline {
            return Ok(found);
        }
        pause(POLL_EVERY, cancel, step).await?;
    }
}

/// Poll until some alternative yields an element (optionally a visible one).
///
/// Fails with [`DriverError::NoSuchElement`] once `timeout` has passed.
pub async fn wait_for_element<P: Page + ?Sized>(
    page: &P,
    selectors: &SelectorList,
    timeout: Duration,
    require_visible: bool,
    cancel: &CancelToken,
    step: Step,
) -> Result<ElementRef, StepError> {
    let deadline = Instant::now() + timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled { step });
        }

        for locator in selectors.iter() {
            let found = page
                .find_all(locator)
                .await
                .map_err(StepError::driver(step))?;
            let Some(element) = found.into_iter().next() else {
                continue;
            };
            if !require_visible
                || page
                    .is_displayed(&element)
                    .await
                    .map_err(StepError::driver(step))?
            {
                return Ok(element);
            }
        }

        if Instant::now() >= deadline {
            return Err(StepError::Driver {
                step,
                source: DriverError::NoSuchElement(selectors.to_string()),
            });
        }
        pause(POLL_EVERY, cancel, step).await?;
    }
}

/// Wait for the first matching element and click it.
pub async fn click_first<P: Page + ?Sized>(
    page: &P,
    selectors: &SelectorList,
    timeout: Duration,
    cancel: &CancelToken,
    step: Step,
) -> Result<ElementRef, StepError> {
    let element = wait_for_element(page, selectors, timeout, false, cancel, step).await?;
    page.click(&element)
        .await
        .map_err(StepError::driver(step))?;
    Ok(element)
}

/// Human-readable label: trimmed text, else `aria-label`, else `fallback`.
pub async fn element_label<P: Page + ?Sized>(
    page: &P,
    element: &ElementRef,
    fallback: &str,
    step: Step,
) -> Result<String, StepError> {
    let text = page
        .text(element)
        .await
        .map_err(StepError::driver(step))?;
    let text = text.trim();
    if !text.is_empty() {
        return Ok(text.to_string());
    }

    let aria = page
        .attribute(element, "aria-label")
        .await
        .map_err(StepError::driver(step))?;
    Ok(aria
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string()))
}

/// Whether `url` is the configured login page or a page below it.
///
/// Query strings and fragments are ignored, so `login?next=/book` still
/// counts as the login page.
pub fn is_login_url(url: &str, login_url: &str) -> bool {
    match (Url::parse(url), Url::parse(login_url)) {
        (Ok(current), Ok(login)) => {
            let login_path = login.path().trim_end_matches('/');
            let path = current.path().trim_end_matches('/');
            current.host_str() == login.host_str()
                && (path == login_path
                    || path
                        .strip_prefix(login_path)
                        .is_some_and(|rest| rest.starts_with('/')))
        }
        _ => url.trim_end_matches('/') == login_url.trim_end_matches('/'),
    }
}
