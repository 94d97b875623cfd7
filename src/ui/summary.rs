//! Run summary panel printed when the controller stops.

use std::time::Duration;

use owo_colors::{OwoColorize, Rgb};

use super::colors::Theme;
use crate::attempt::AttemptOutcome;
use crate::retry::RunReport;

/// Renders a [`RunReport`] for the terminal.
#[derive(Debug)]
pub struct SummaryRenderer {
    theme: Theme,
    width: usize,
    color: bool,
}

impl Default for SummaryRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryRenderer {
    pub fn new() -> Self {
        Self {
            theme: Theme::default(),
            width: 60,
            color: true,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(20);
        self
    }

    pub fn with_color(mut self, enabled: bool) -> Self {
        self.color = enabled;
        self
    }

    /// Render the complete summary.
    pub fn render(&self, report: &RunReport) -> String {
        let mut output = String::new();
        output.push_str(&self.render_banner(report));
        output.push('\n');
        output.push_str(&self.render_attempts(report));
        output.push('\n');
        output.push_str(&self.render_totals(report));
        output
    }

    /// Boxed headline: what was booked, or that nothing was.
    pub fn render_banner(&self, report: &RunReport) -> String {
        let inner = self.width - 2;
        let (headline, color) = match &report.booking {
            Some(booking) if booking.confirmed => {
                (format!("✓ Booked {}", booking), self.theme.success)
            }
            Some(booking) => (format!("✓ Slot found: {}", booking), self.theme.success),
            None => ("✗ No booking made".to_string(), self.theme.error),
        };
        let attempts = if report.attempts == 1 {
            "1 attempt".to_string()
        } else {
            format!("{} attempts", report.attempts)
        };
        let subtitle = format!("{} mode, {}", report.mode, attempts);

        let mut output = String::new();
        output.push_str(&format!("╭{}╮\n", "─".repeat(inner)));
        output.push_str(&self.centered(&headline, inner, color, true));
        output.push_str(&self.centered(&subtitle, inner, self.theme.muted, false));
        output.push_str(&format!("╰{}╯\n", "─".repeat(inner)));
        output
    }

    /// One row per retained attempt, newest last; older ones collapse into
    /// one line.
    pub fn render_attempts(&self, report: &RunReport) -> String {
        let mut output = String::new();
        if report.history.is_empty() {
            output.push_str(&format!(
                "  {}\n",
                self.paint("No attempts were made", self.theme.muted)
            ));
            return output;
        }

        output.push_str(&format!(
            "  {}\n",
            self.paint(
                &format!("{:<4} {:<9} {:<34} {}", "#", "Time", "Outcome", "Next"),
                self.theme.muted
            )
        ));

        let skipped = report.earlier_attempts();
        if skipped > 0 {
            output.push_str(&format!(
                "  {}\n",
                self.paint(
                    &format!("… {} earlier attempts", skipped),
                    self.theme.muted
                )
            ));
        }

        for record in &report.history {
            let outcome = truncate(&outcome_label(&record.outcome), 34);
            let next = record
                .wait
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string());
            output.push_str(&format!(
                "  {:<4} {:<9} {} {}\n",
                record.attempt,
                record.started_at.format("%H:%M:%S"),
                self.paint(&format!("{:<34}", outcome), self.outcome_color(&record.outcome)),
                self.paint(&next, self.theme.muted),
            ));
        }
        output
    }

    /// Time spent waiting and why the run stopped.
    pub fn render_totals(&self, report: &RunReport) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "  {} {}\n",
            self.paint("Waited:", self.theme.muted),
            format_duration(report.total_wait)
        ));
        if let Some(reason) = &report.reason {
            output.push_str(&format!(
                "  {} {}\n",
                self.paint("Stopped:", self.theme.muted),
                self.paint(reason, self.theme.error)
            ));
        }
        if let Some(booking) = &report.booking {
            if !booking.confirmed {
                output.push_str(&format!(
                    "  {} {}\n",
                    self.paint("Note:", self.theme.muted),
                    self.paint(
                        "dry run; re-run with --execute to book for real",
                        self.theme.warning
                    )
                ));
            }
        }
        output
    }

    fn outcome_color(&self, outcome: &AttemptOutcome) -> Rgb {
        match outcome {
            AttemptOutcome::Success(_) => self.theme.success,
            AttemptOutcome::NotAvailableYet => self.theme.waiting,
            AttemptOutcome::TransientError(_) => self.theme.warning,
            AttemptOutcome::FatalError(_) => self.theme.error,
        }
    }

    fn centered(&self, text: &str, inner: usize, color: Rgb, bold: bool) -> String {
        let text = truncate(text, inner.saturating_sub(2));
        let len = text.chars().count();
        let left = inner.saturating_sub(len) / 2;
        let right = inner.saturating_sub(len).saturating_sub(left);
        let painted = if bold && self.color {
            text.color(color).bold().to_string()
        } else {
            self.paint(&text, color)
        };
        format!("│{}{}{}│\n", " ".repeat(left), painted, " ".repeat(right))
    }

    fn paint(&self, text: &str, color: Rgb) -> String {
        if self.color {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }
}

fn outcome_label(outcome: &AttemptOutcome) -> String {
    match outcome {
        AttemptOutcome::Success(booking) => format!("booked {}", booking.date),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// `45s`, `5m 0s`, `2h 5m`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
