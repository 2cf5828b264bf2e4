//! Command-line interface definition for Loom.
//!
//! # Command Structure
//!
//! - `loom run` - Run the application locally with redeploy-on-change

mod commands;
mod validation;

use clap::Parser;

pub use commands::{Command, RunArgs};
pub use validation::parse_existing_file;

/// Loom - develop serverless apps against a live runtime
#[derive(Parser, Debug)]
#[command(
    name = "loom",
    version,
    about = "Develop serverless apps against a live runtime",
    long_about = "Loom builds and deploys your actions, serves your frontend with the\n\
                  deployed endpoint URLs injected, and redeploys whenever action\n\
                  sources change. Use --local to run everything against a local runtime."
)]
pub struct Cli {
    /// Enable verbose logging (debug level) and full error chains
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
