//! Element selectors for the booking flow.
//!
//! Booking portals change their markup often, so every element the bot
//! touches is described by a list of alternatives that are tried in order.
//! An alternative is written in one of these forms:
//!
//! - `xpath=//button[@id='go']` for a raw XPath expression
//! - `text=Get OTP` for any element whose own text is exactly `Get OTP`
//! - `button:has-text('Get OTP')` for a `button` whose text contains `Get OTP`
//! - anything else is passed through as a CSS selector
//!
//! A single string may hold several alternatives separated by top-level
//! commas, which keeps the familiar `a, b, c` selector-group syntax working.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

static HAS_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([A-Za-z][\w-]*|\*)?:has-text\((?:'([^']*)'|"([^"]*)")\)$"#)
        .expect("Invalid has-text pattern")
});

/// A single way of locating an element, in W3C WebDriver terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector, sent with the `css selector` strategy.
    Css(String),
    /// XPath expression, sent with the `xpath` strategy.
    XPath(String),
}

impl Locator {
    /// Parse one alternative. Never fails: unknown syntax is treated as CSS.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some(expr) = raw.strip_prefix("xpath=") {
            return Locator::XPath(expr.trim().to_string());
        }

        if let Some(text) = raw.strip_prefix("text=") {
            return Locator::XPath(format!(
                "//*[normalize-space(text())={}]",
                xpath_literal(text.trim())
            ));
        }

        if let Some(caps) = HAS_TEXT.captures(raw) {
            let tag = caps.get(1).map_or("*", |m| m.as_str());
            let text = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            return Locator::XPath(format!(
                "//{}[contains(normalize-space(.), {})]",
                tag,
                xpath_literal(text)
            ));
        }

        Locator::Css(raw.to_string())
    }

    /// The WebDriver `using` value for this locator.
    pub fn strategy(&self) -> &'static str {
        match self {
            Locator::Css(_) => "css selector",
            Locator::XPath(_) => "xpath",
        }
    }

    /// The WebDriver `value` for this locator.
    pub fn value(&self) -> &str {
        match self {
            Locator::Css(v) | Locator::XPath(v) => v,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(v) => write!(f, "css `{}`", v),
            Locator::XPath(v) => write!(f, "xpath `{}`", v),
        }
    }
}

/// Quote `text` as an XPath 1.0 string literal.
///
/// XPath 1.0 has no escape sequences, so text holding both quote kinds is
/// assembled with `concat()`.
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{}'", text);
    }
    if !text.contains('"') {
        return format!("\"{}\"", text);
    }

    let parts: Vec<String> = text
        .split('\'')
        .map(|part| format!("'{}'", part))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Split on commas that are not nested inside quotes, brackets or parens.
fn split_alternatives(raw: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (idx, ch) in raw.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth -= 1,
            (None, ',') if depth == 0 => {
                out.push(&raw[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    out.push(&raw[start..]);

    out.into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Ordered alternatives for one element of the booking flow.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "RawSelector")]
pub struct SelectorList(Vec<Locator>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelector {
    One(String),
    Many(Vec<String>),
}

impl From<RawSelector> for SelectorList {
    fn from(raw: RawSelector) -> Self {
        match raw {
            RawSelector::One(s) => SelectorList::parse(&s),
            RawSelector::Many(items) => {
                SelectorList::from_alternatives(items.iter().map(String::as_str))
            }
        }
    }
}

impl SelectorList {
    /// Parse a comma-separated selector string.
    pub fn parse(raw: &str) -> Self {
        Self::from_alternatives(std::iter::once(raw))
    }

    fn from_alternatives<'a>(items: impl IntoIterator<Item = &'a str>) -> Self {
        SelectorList(
            items
                .into_iter()
                .flat_map(split_alternatives)
                .map(Locator::parse)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Locator> {
        self.0.iter()
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(" | "))
    }
}

/// Selectors for every element the booking flow interacts with.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Mobile number input on the login page
    pub mobile_input: SelectorList,
    /// Button that requests the OTP
    pub get_otp: SelectorList,
    /// Control that opens the date picker
    pub open_calendar: SelectorList,
    /// Selectable (not disabled) dates in the picker
    pub enabled_date: SelectorList,
    /// Selectable time slots once a date is picked; skipped when unset
    pub slot: Option<SelectorList>,
    /// Final proceed/book button
    pub proceed: SelectorList,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            mobile_input: SelectorList::parse(
                "input[formcontrolname='mobile'], \
                 input[placeholder='Enter your mobile number'], \
                 input[placeholder*='mobile'], input[name*='mobile'], input[type='tel']",
            ),
            get_otp: SelectorList::parse("button:has-text('Get OTP'), button:has-text('Get Otp')"),
            open_calendar: SelectorList::parse(
                "input[type='date'], .datepicker, [data-toggle='datepicker']",
            ),
            enabled_date: SelectorList::parse(
                ".ui-datepicker-calendar td:not(.ui-datepicker-unselectable):not(.disabled) a, \
                 .available-date",
            ),
            slot: None,
            proceed: SelectorList::parse(
                "button:has-text('Proceed'), button:has-text('Book'), input[type='submit']",
            ),
        }
    }
}

impl SelectorConfig {
    /// Names of required selector lists that ended up empty.
    pub fn empty_fields(&self) -> Vec<&'static str> {
        let mut empty = Vec::new();
        let required = [
            ("selectors.mobile_input", &self.mobile_input),
            ("selectors.get_otp", &self.get_otp),
            ("selectors.open_calendar", &self.open_calendar),
            ("selectors.enabled_date", &self.enabled_date),
            ("selectors.proceed", &self.proceed),
        ];
        for (name, list) in required {
            if list.is_empty() {
                empty.push(name);
            }
        }
        if self.slot.as_ref().is_some_and(SelectorList::is_empty) {
            empty.push("selectors.slot");
        }
        empty
    }
}
