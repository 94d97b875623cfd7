//! Browser control over the W3C WebDriver protocol.
//!
//! The booking flow only talks to the [`Page`] and [`BrowserLauncher`]
//! traits. [`WebDriverClient`] implements them against a running
//! chromedriver/geckodriver; tests substitute scripted fakes.

pub mod client;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Locator;

pub use client::{WebDriverClient, WebDriverSession};

/// Errors from the WebDriver server or the HTTP transport to it.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The HTTP request itself failed (connection refused, reset, ...).
    #[error("webdriver request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a W3C error object.
    #[error("webdriver error `{error}`: {message}")]
    Command { error: String, message: String },

    /// The server answered with something that is not a W3C response.
    #[error("unexpected webdriver response: {0}")]
    Protocol(String),

    /// No alternative of a selector list matched within the timeout.
    #[error("no element matched {0}")]
    NoSuchElement(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Opaque handle to an element in the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

/// One open browser window.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> DriverResult<()>;

    async fn current_url(&self) -> DriverResult<String>;

    /// All elements matching `locator`; empty when nothing matches.
    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<ElementRef>>;

    async fn click(&self, element: &ElementRef) -> DriverResult<()>;

    /// Type `text` into an input element.
    async fn send_keys(&self, element: &ElementRef, text: &str) -> DriverResult<()>;

    /// Rendered text of an element.
    async fn text(&self, element: &ElementRef) -> DriverResult<String>;

    async fn attribute(&self, element: &ElementRef, name: &str) -> DriverResult<Option<String>>;

    async fn is_displayed(&self, element: &ElementRef) -> DriverResult<bool>;

    /// End the browser session. Safe to call more than once.
    async fn close(&self) -> DriverResult<()>;
}

/// Opens fresh browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Page: Page;

    async fn launch(&self) -> DriverResult<Self::Page>;
}
