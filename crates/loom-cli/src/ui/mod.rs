//! Terminal status output.
//!
//! Colored status lines and a spinner, degrading gracefully when stderr is
//! not a terminal or when running in CI.
//!
//! ```no_run
//! use loom_cli::ui;
//!
//! ui::init_colors();
//! let spinner = ui::Spinner::new("Deploying actions...");
//! spinner.finish("Deployed");
//! ui::warning("Port 9080 is busy, using port 9081 instead");
//! ```

mod messages;
mod spinner;

pub use messages::{
    error, format_log_line, info, log_line, set_color, set_quiet, success, warning,
};
pub use spinner::Spinner;

/// Check if running in a CI environment.
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("CIRCLECI").is_ok()
        || std::env::var("TRAVIS").is_ok()
}

/// Check if color output should be enabled.
///
/// Respects NO_COLOR and FORCE_COLOR, then falls back to terminal detection.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }
    console::user_attended_stderr()
}

/// Apply the color decision to every status line printed afterwards.
pub fn init_colors() {
    set_color(should_use_color());
}
