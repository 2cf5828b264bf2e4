//! Status message functions for terminal output.
//!
//! All status lines go to stderr so stdout stays free for action logs.

use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicBool, Ordering};

static QUIET: AtomicBool = AtomicBool::new(false);
static COLOR: AtomicBool = AtomicBool::new(true);

/// Suppress success and info lines; warnings and errors still print.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub(crate) fn quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Enable or disable ANSI colors in status lines.
pub fn set_color(enabled: bool) {
    COLOR.store(enabled, Ordering::Relaxed);
}

fn color() -> bool {
    COLOR.load(Ordering::Relaxed)
}

/// Print a success message to stderr.
///
/// ```no_run
/// use loom_cli::ui::success;
///
/// success("Deployed 2 action(s)");
/// ```
pub fn success(message: &str) {
    if quiet() {
        return;
    }
    if color() {
        eprintln!("{} {}", "✓".green().bold(), message);
    } else {
        eprintln!("✓ {}", message);
    }
}

/// Print an info message to stderr.
pub fn info(message: &str) {
    if quiet() {
        return;
    }
    if color() {
        eprintln!("{} {}", "ℹ".blue().bold(), message);
    } else {
        eprintln!("ℹ {}", message);
    }
}

/// Print a warning message to stderr.
pub fn warning(message: &str) {
    if color() {
        eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
    } else {
        eprintln!("⚠ {}", message);
    }
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    if color() {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    } else {
        eprintln!("✗ {}", message);
    }
}

/// Render one runtime log line, prefixed with its unit.
pub fn format_log_line(unit: &str, message: &str) -> String {
    let prefix = format!("[{}]", unit);
    if color() {
        format!("{} {}", prefix.cyan(), message)
    } else {
        format!("{} {}", prefix, message)
    }
}

/// Print a runtime log line to stdout. Quiet mode does not apply.
pub fn log_line(unit: &str, message: &str) {
    println!("{}", format_log_line(unit, message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_status_messages() {
        success("Success message");
        info("Info message");
        warning("Warning message");
        error("Error message");
    }

    #[test]
    #[serial]
    fn test_log_line_follows_color_switch() {
        set_color(false);
        let plain = format_log_line("app/action", "hello");
        set_color(true);
        let colored = format_log_line("app/action", "hello");

        assert_eq!(plain, "[app/action] hello");
        assert!(colored.contains('\u{1b}'));
        assert!(colored.ends_with(" hello"));
    }
}
