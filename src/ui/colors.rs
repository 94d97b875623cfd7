//! 24-bit RGB color theme for terminal output.

use owo_colors::Rgb;

/// Colors used by the run summary.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    /// Booked / done - green (34, 197, 94)
    pub success: Rgb,
    /// Failed run, fatal errors - red (239, 68, 68)
    pub error: Rgb,
    /// Transient errors - yellow (234, 179, 8)
    pub warning: Rgb,
    /// Polling / not available yet - blue (59, 130, 246)
    pub waiting: Rgb,
    /// Labels and secondary text - gray (107, 114, 128)
    pub muted: Rgb,
    /// Dates and slots - cyan (34, 211, 238)
    pub highlight: Rgb,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            success: Rgb(34, 197, 94),
            error: Rgb(239, 68, 68),
            warning: Rgb(234, 179, 8),
            waiting: Rgb(59, 130, 246),
            muted: Rgb(107, 114, 128),
            highlight: Rgb(34, 211, 238),
        }
    }
}
