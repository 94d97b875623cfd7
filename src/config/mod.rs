//! Configuration loading for slotbot.
//!
//! Settings are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. an optional YAML or TOML file (format picked from the extension)
//! 3. `SLOTBOT__<FIELD>` environment variables (`__` separates nested keys,
//!    e.g. `SLOTBOT__SELECTORS__PROCEED`)
//! 4. `MOBILE_NUMBER`
//! 5. command-line overrides
//!
//! The merged [`BotConfig`] is validated once and then only read.

pub mod selectors;

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

use crate::retry::RetryPolicy;

pub use selectors::{Locator, SelectorConfig, SelectorList};

/// Prefix for environment overrides (`SLOTBOT__INTERVAL_SECONDS=60`).
pub const ENV_PREFIX: &str = "SLOTBOT";

/// Environment variable that supplies the login mobile number.
pub const MOBILE_NUMBER_ENV: &str = "MOBILE_NUMBER";

pub const DEFAULT_LOGIN_URL: &str = "https://www.shrimahakaleshwar.mp.gov.in/services/login";
pub const DEFAULT_BOOKING_URL: &str =
    "https://www.shrimahakaleshwar.mp.gov.in/services/bhasmaarti-booking";

/// Whether to make a single attempt or keep polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One attempt, then exit
    #[default]
    Once,
    /// Keep attempting until booked, a fatal error, or the attempt limit
    Continuous,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Once => write!(f, "once"),
            RunMode::Continuous => write!(f, "continuous"),
        }
    }
}

/// Browser requested from the WebDriver server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chrome,
    Firefox,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// A source could not be read or deserialized.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// A value was read but is not usable.
    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Every setting the bot reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Single attempt or continuous polling
    pub mode: RunMode,
    /// Run the browser without a window
    pub headless: bool,
    /// Stop before the final confirmation click
    pub dry_run: bool,
    /// Wait between attempts in continuous mode
    pub interval_seconds: u64,
    /// Attempt limit in continuous mode (0 = unbounded)
    pub max_attempts: u32,
    /// Random spread applied to every wait, as a percentage (0-100)
    pub jitter_percent: u8,
    /// Ceiling for the backoff after transient errors; raised to the interval if lower
    pub max_backoff_seconds: u64,
    /// Give up after this many transient errors in a row (0 = never)
    pub max_consecutive_errors: u32,
    /// Per-step element and navigation timeout
    pub timeout_ms: u64,
    /// How long to wait for the user to enter the OTP
    pub otp_wait_seconds: u64,
    /// Mobile number used to log in
    pub mobile_number: String,
    /// Address of the WebDriver server
    pub webdriver_url: String,
    pub browser: BrowserKind,
    pub login_url: String,
    pub booking_url: String,
    pub selectors: SelectorConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Once,
            headless: true,
            dry_run: true,
            interval_seconds: 300,
            max_attempts: 0,
            jitter_percent: 10,
            max_backoff_seconds: 1800,
            max_consecutive_errors: 5,
            timeout_ms: 20_000,
            otp_wait_seconds: 120,
            mobile_number: String::new(),
            webdriver_url: "http://localhost:9515".to_string(),
            browser: BrowserKind::Chrome,
            login_url: DEFAULT_LOGIN_URL.to_string(),
            booking_url: DEFAULT_BOOKING_URL.to_string(),
            selectors: SelectorConfig::default(),
        }
    }
}

/// Values supplied on the command line, applied last.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub mode: Option<RunMode>,
    /// `--headful`: show the browser window
    pub headful: bool,
    /// `--execute`: really click the final confirmation
    pub execute: bool,
    pub max_attempts: Option<u32>,
    pub interval_seconds: Option<u64>,
    pub webdriver_url: Option<String>,
}

impl BotConfig {
    /// Load configuration from the optional file plus the environment.
    ///
    /// The result is not validated yet; call [`BotConfig::validate`] after
    /// applying command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be parsed, or a
    /// value has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        // Set as a raw string so numbers with a leading zero survive intact.
        if let Ok(mobile) = std::env::var(MOBILE_NUMBER_ENV) {
            if !mobile.trim().is_empty() {
                builder = builder.set_override("mobile_number", mobile.trim().to_string())?;
            }
        }

        let config: BotConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(mode) = overrides.mode {
            self.mode = mode;
        }
        if overrides.headful {
            self.headless = false;
        }
        if overrides.execute {
            self.dry_run = false;
        }
        if let Some(max) = overrides.max_attempts {
            self.max_attempts = max;
        }
        if let Some(interval) = overrides.interval_seconds {
            self.interval_seconds = interval;
        }
        if let Some(url) = overrides.webdriver_url {
            self.webdriver_url = url;
        }
        self
    }

    /// Check every value the bot depends on.
    ///
    /// # Errors
    ///
    /// Returns the first unusable value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let digits = self.mobile_number.chars().filter(char::is_ascii_digit).count();
        if self.mobile_number.trim().is_empty() {
            return Err(ConfigError::invalid(
                "mobile_number",
                format!("not set; add it to the config file or set {MOBILE_NUMBER_ENV}"),
            ));
        }
        if digits < 10 {
            return Err(ConfigError::invalid(
                "mobile_number",
                "must contain at least 10 digits",
            ));
        }
        if self.interval_seconds == 0 {
            return Err(ConfigError::invalid("interval_seconds", "must be greater than 0"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("timeout_ms", "must be greater than 0"));
        }
        if self.jitter_percent > 100 {
            return Err(ConfigError::invalid(
                "jitter_percent",
                format!("{} is above 100", self.jitter_percent),
            ));
        }
        for (field, value) in [
            ("webdriver_url", &self.webdriver_url),
            ("login_url", &self.login_url),
            ("booking_url", &self.booking_url),
        ] {
            Url::parse(value).map_err(|e| ConfigError::invalid(field, format!("{value}: {e}")))?;
        }
        if let Some(field) = self.selectors.empty_fields().first() {
            return Err(ConfigError::invalid(*field, "selector list is empty"));
        }
        Ok(())
    }

    /// Load, override and validate in one step.
    ///
    /// # Errors
    ///
    /// Any loading or validation error.
    pub fn resolve(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let config = Self::load(path)?.with_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn otp_wait(&self) -> Duration {
        Duration::from_secs(self.otp_wait_seconds)
    }

    /// The subset of settings the retry controller works from.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            mode: self.mode,
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
            dry_run: self.dry_run,
            policy: RetryPolicy::new(
                self.poll_interval(),
                Duration::from_secs(self.max_backoff_seconds),
                self.jitter_percent,
            )
            .with_max_consecutive_errors(self.max_consecutive_errors),
        }
    }

    /// Mobile number with all but the last four digits hidden, for logs.
    pub fn masked_mobile(&self) -> String {
        mask_mobile(&self.mobile_number)
    }
}

/// Hide all but the last four characters of a phone number.
pub fn mask_mobile(number: &str) -> String {
    let chars: Vec<char> = number.trim().chars().collect();
    let visible = chars.len().min(4);
    let hidden = chars.len() - visible;
    let tail: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}

/// Immutable settings for the retry controller.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: RunMode,
    /// `None` means unbounded
    pub max_attempts: Option<u32>,
    pub dry_run: bool,
    pub policy: RetryPolicy,
}
