//! Command implementations for the Loom CLI.
//!
//! - [`run`] - Development session with redeploy-on-change
//!
//! Each command provides an `execute` function that takes the parsed
//! arguments and returns a Result.

pub mod run;
pub(crate) mod utils;

pub use run::execute as run_execute;
