//! slotbot - polls an appointment portal and books the first open slot.
//!
//! The library is split along the booking pipeline: configuration, a thin
//! WebDriver client, the site-specific booking steps, one-attempt execution
//! and the retry controller that decides whether to try again.

pub mod attempt;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod logging;
pub mod retry;
pub mod site;
pub mod ui;
pub mod webdriver;
