//! Miette diagnostic conversion for CLI errors.
//!
//! By default a fatal error is reported as a single summarized message. With
//! `--verbose` the whole `source()` chain is rendered so the underlying cause
//! (process output, HTTP failure, I/O error) is visible.

use crate::error::CliError;
use ::miette::Report;
use std::error::Error as _;

/// Convert a CliError into a miette report.
pub fn cli_error_to_miette(err: CliError, verbose: bool) -> Report {
    if verbose {
        ::miette::miette!("{}", full_chain(&err))
    } else {
        ::miette::miette!("{}", summary(&err))
    }
}

/// Top-level message only.
pub fn summary(err: &CliError) -> String {
    err.to_string()
}

/// Top-level message followed by every underlying cause.
pub fn full_chain(err: &CliError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\n\nCaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DevError;

    fn nested() -> CliError {
        DevError::Cleanup {
            label: "emulator".to_string(),
            source: Box::new(DevError::Io(std::io::Error::other("kill failed"))),
        }
        .into()
    }

    #[test]
    fn test_summary_is_single_message() {
        let msg = summary(&nested());
        assert!(msg.starts_with("Cleanup step 'emulator' failed"));
        assert!(!msg.contains("Caused by"));
    }

    #[test]
    fn test_full_chain_lists_causes() {
        let msg = full_chain(&nested());
        assert!(msg.contains("Caused by: I/O error: kill failed"));
        assert!(msg.contains("Caused by: kill failed"));
    }
}
