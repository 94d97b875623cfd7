//! Terminal output for the end-of-run summary.
//!
//! Progress is reported through `tracing`; this module only renders the
//! final report on stdout.

mod colors;
mod summary;

pub use summary::SummaryRenderer;

/// Whether colored output should be used.
///
/// Respects the `NO_COLOR` convention in addition to `--no-color`.
pub fn use_color(no_color_flag: bool) -> bool {
    !no_color_flag && std::env::var_os("NO_COLOR").is_none()
}
