//! Loom CLI entry point: argument parsing, logging, command dispatch and
//! exit codes.

use clap::Parser;
use loom_cli::{cli, commands, error, logger, ui};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors();
    if args.no_color {
        ui::set_color(false);
    }
    ui::set_quiet(args.quiet);

    let result = match args.command {
        cli::Command::Run(run_args) => commands::run_execute(run_args).await,
    };

    match result {
        Ok(outcome) => ExitCode::from(outcome.exit_code() as u8),
        Err(e) => {
            eprintln!("{:?}", error::cli_error_to_miette(e, args.verbose));
            ExitCode::FAILURE
        }
    }
}
