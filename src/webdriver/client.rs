// W3C WebDriver client over reqwest.
// Covers only the endpoints the booking flow needs: session lifecycle,
// navigation, element lookup, click, typing and reading text/attributes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

use super::{BrowserLauncher, DriverError, DriverResult, ElementRef, Page};
use crate::config::{BotConfig, BrowserKind, Locator};

/// Key under which W3C servers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// HTTP plumbing shared by the client and its sessions.
#[derive(Debug, Clone)]
struct Wire {
    http: Client,
    base: String,
}

impl Wire {
    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            self.base.clone()
        } else {
            format!("{}/{}", self.base, path)
        }
    }

    async fn get(&self, path: &str) -> DriverResult<Value> {
        self.send(self.http.get(self.url(path))).await
    }

    async fn post(&self, path: &str, body: Value) -> DriverResult<Value> {
        self.send(self.http.post(self.url(path)).json(&body)).await
    }

    async fn delete(&self, path: &str) -> DriverResult<Value> {
        self.send(self.http.delete(self.url(path))).await
    }

    /// Send a request and unwrap the W3C `{"value": ...}` envelope.
    async fn send(&self, request: RequestBuilder) -> DriverResult<Value> {
        let response = request.send().await?;
        let status = response.status();
        let mut body: Value = response
            .json()
            .await
            .map_err(|e| DriverError::Protocol(format!("HTTP {}: {}", status, e)))?;
        let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);

        if !status.is_success() {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(DriverError::Command { error, message });
        }

        Ok(value)
    }
}

/// Connection to a WebDriver server; opens one session per attempt.
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    wire: Wire,
    browser: BrowserKind,
    headless: bool,
    page_load_timeout: Duration,
}

impl WebDriverClient {
    /// Create a client for the server at `base_url`.
    pub fn new(
        base_url: &str,
        browser: BrowserKind,
        headless: bool,
        page_load_timeout: Duration,
    ) -> DriverResult<Self> {
        let http = Client::builder()
            // Allow the server to finish a page load before the HTTP call gives up.
            .timeout(page_load_timeout + Duration::from_secs(30))
            .build()?;

        Ok(Self {
            wire: Wire {
                http,
                base: base_url.trim_end_matches('/').to_string(),
            },
            browser,
            headless,
            page_load_timeout,
        })
    }

    pub fn from_config(config: &BotConfig) -> DriverResult<Self> {
        Self::new(
            &config.webdriver_url,
            config.browser,
            config.headless,
            config.step_timeout(),
        )
    }

    /// `alwaysMatch` capabilities for the configured browser.
    fn capabilities(&self) -> Value {
        match self.browser {
            BrowserKind::Chrome => {
                let mut args = vec!["--window-size=1280,900"];
                if self.headless {
                    args.push("--headless=new");
                }
                json!({
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                })
            }
            BrowserKind::Firefox => {
                let args: Vec<&str> = if self.headless { vec!["-headless"] } else { vec![] };
                json!({
                    "browserName": "firefox",
                    "moz:firefoxOptions": { "args": args }
                })
            }
        }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverClient {
    type Page = WebDriverSession;

    async fn launch(&self) -> DriverResult<WebDriverSession> {
        let value = self
            .wire
            .post(
                "session",
                json!({ "capabilities": { "alwaysMatch": self.capabilities() } }),
            )
            .await?;

        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol("new session response has no sessionId".into()))?
            .to_string();

        tracing::debug!(session = %id, browser = ?self.browser, headless = self.headless, "webdriver session opened");

        let session = WebDriverSession {
            wire: Wire {
                http: self.wire.http.clone(),
                base: self.wire.url(&format!("session/{}", id)),
            },
            id,
            closed: AtomicBool::new(false),
        };

        let timeouts = json!({ "pageLoad": self.page_load_timeout.as_millis() as u64 });
        if let Err(e) = session.wire.post("timeouts", timeouts).await {
            // Don't leak the browser when setup fails halfway.
            let _ = session.close().await;
            return Err(e);
        }

        Ok(session)
    }
}

/// One live browser session.
#[derive(Debug)]
pub struct WebDriverSession {
    wire: Wire,
    id: String,
    closed: AtomicBool,
}

impl WebDriverSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn element_path(element: &ElementRef, action: &str) -> String {
        format!("element/{}/{}", element.0, action)
    }
}

#[async_trait]
impl Page for WebDriverSession {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.wire.post("url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        let value = self.wire.get("url").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DriverError::Protocol(format!("current url is not a string: {}", value)))
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<ElementRef>> {
        let value = self
            .wire
            .post(
                "elements",
                json!({ "using": locator.strategy(), "value": locator.value() }),
            )
            .await?;

        let items = value
            .as_array()
            .ok_or_else(|| DriverError::Protocol(format!("elements is not an array: {}", value)))?;

        items
            .iter()
            .map(|item| {
                item.get(ELEMENT_KEY)
                    .and_then(Value::as_str)
                    .map(|id| ElementRef(id.to_string()))
                    .ok_or_else(|| DriverError::Protocol(format!("bad element reference: {}", item)))
            })
            .collect()
    }

    async fn click(&self, element: &ElementRef) -> DriverResult<()> {
        self.wire
            .post(&Self::element_path(element, "click"), json!({}))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> DriverResult<()> {
        self.wire
            .post(&Self::element_path(element, "value"), json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn text(&self, element: &ElementRef) -> DriverResult<String> {
        let value = self.wire.get(&Self::element_path(element, "text")).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> DriverResult<Option<String>> {
        let value = self
            .wire
            .get(&Self::element_path(element, &format!("attribute/{}", name)))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn is_displayed(&self, element: &ElementRef) -> DriverResult<bool> {
        let value = self
            .wire
            .get(&Self::element_path(element, "displayed"))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn close(&self) -> DriverResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.wire.delete("").await?;
        tracing::debug!(session = %self.id, "webdriver session closed");
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            tracing::warn!(session = %self.id, "webdriver session dropped without being closed");
        }
    }
}
