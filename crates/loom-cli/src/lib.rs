//! Loom CLI - local development loop for serverless applications.
//!
//! `loom run` builds and deploys a project's actions, serves its frontend
//! with the deployed endpoint URLs injected, redeploys actions when their
//! sources change, and tears everything down on Ctrl+C.
//!
//! # Architecture
//!
//! - [`dev`] - The development session: coordinator, change scheduler,
//!   frontend server, local emulator bootstrap, teardown ledger
//! - [`config`] - `loom.config.*` loading and validation
//! - [`error`] - Error types with actionable messages
//! - [`logger`] - Structured logging with tracing
//! - [`ui`] - Terminal status output
//! - `cli` / `commands` - Argument parsing and command implementations
//!
//! # Example
//!
//! ```rust,no_run
//! use loom_cli::config::AppConfig;
//! use loom_cli::dev::{CommandService, DevCoordinator, DevOptions, ScriptHooks, StaticBundler};
//! use std::sync::Arc;
//!
//! # async fn demo() -> loom_cli::Result<()> {
//! let config = AppConfig::load(std::path::Path::new("."), None)?;
//! let coordinator = DevCoordinator::new(
//!     Arc::new(CommandService::new()),
//!     Arc::new(StaticBundler),
//!     Arc::new(ScriptHooks::from_config(&config)),
//! );
//! let session = coordinator.run(&config, &DevOptions::default()).await?;
//! println!("{:?}", session.frontend_url);
//! session.finished().await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, ConfigError, DevError, Result, ResultExt};
