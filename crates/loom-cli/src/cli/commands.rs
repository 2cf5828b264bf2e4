use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::validation::parse_existing_file;

/// Available Loom subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the application for development
    ///
    /// Builds and deploys actions, serves the frontend, and redeploys actions
    /// whenever their sources change. Stops on Ctrl+C.
    Run(RunArgs),
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Deploy actions to a local runtime instead of the configured target
    ///
    /// Requires Java 11+ and a running Docker daemon. The runtime is
    /// downloaded once into the Loom data directory.
    #[arg(long)]
    pub local: bool,

    /// Do not build, deploy or watch actions
    #[arg(long)]
    pub skip_actions: bool,

    /// Do not bundle or serve the frontend
    #[arg(long)]
    pub skip_serve: bool,

    /// Port for the frontend server
    ///
    /// A nearby free port is used if this one is taken.
    #[arg(short, long, default_value_t = crate::config::default_port(), value_name = "PORT")]
    pub port: u16,

    /// Periodically print action logs
    #[arg(long)]
    pub fetch_logs: bool,

    /// Private key for serving the frontend over HTTPS
    #[arg(long, requires = "tls_cert", value_parser = parse_existing_file, value_name = "FILE")]
    pub tls_key: Option<PathBuf>,

    /// Certificate for serving the frontend over HTTPS
    #[arg(long, requires = "tls_key", value_parser = parse_existing_file, value_name = "FILE")]
    pub tls_cert: Option<PathBuf>,

    /// Path to the config file (default: loom.config.toml or loom.config.json)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Project root
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}
