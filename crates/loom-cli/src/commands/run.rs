//! `loom run`: a development session.
//!
//! 1. Resolve the project root, load and validate configuration
//! 2. Run the `pre-app-run` hook
//! 3. Start the session (actions, frontend, logs)
//! 4. Report the frontend URL and run the `post-app-run` hook
//! 5. Wait for Ctrl+C and unwind everything the session acquired

use crate::cli::RunArgs;
use crate::commands::utils::resolve_project_root;
use crate::config::AppConfig;
use crate::dev::hooks::{HookRunner, POST_APP_RUN, PRE_APP_RUN};
use crate::dev::{
    CommandService, DevCoordinator, DevOptions, ScriptHooks, ServeOptions, ShutdownOutcome,
    StaticBundler, TlsFiles,
};
use crate::error::{Result, ResultExt};
use crate::ui;
use std::sync::Arc;

impl From<&RunArgs> for DevOptions {
    fn from(args: &RunArgs) -> Self {
        let tls = match (&args.tls_key, &args.tls_cert) {
            (Some(key), Some(cert)) => Some(TlsFiles {
                key: key.clone(),
                cert: cert.clone(),
            }),
            _ => None,
        };

        Self {
            local: args.local,
            skip_actions: args.skip_actions,
            skip_serve: args.skip_serve,
            port: args.port,
            fetch_logs: args.fetch_logs,
            serve: ServeOptions { tls },
        }
    }
}

/// Execute the run command.
///
/// Returns once the session has been shut down by an interrupt; the outcome
/// decides the process exit code.
///
/// # Errors
///
/// Returns errors for invalid configuration, failing hooks, and any session
/// step that fails to start (after releasing what was already acquired).
pub async fn execute(args: RunArgs) -> Result<ShutdownOutcome> {
    let root = resolve_project_root(args.cwd.as_deref())?;
    let config = AppConfig::load(&root, args.config.as_deref())?;
    config.validate()?;
    tracing::debug!(root = %root.display(), "configuration loaded");

    let options = DevOptions::from(&args);
    let local_session = options.local && config.app.has_backend && !options.skip_actions;
    let hooks = Arc::new(ScriptHooks::from_config(&config).local(local_session));
    hooks
        .try_run(PRE_APP_RUN)
        .await
        .context("Session aborted before start")?;

    if local_session {
        ui::info("Using the local runtime");
    }

    let coordinator = DevCoordinator::new(
        Arc::new(CommandService::new()),
        Arc::new(StaticBundler),
        hooks.clone(),
    );
    let session = coordinator
        .run(&config, &options)
        .await
        .context("Failed to start the development session")?;

    match &session.frontend_url {
        Some(url) => ui::success(&format!("Frontend available at {}", url)),
        None => ui::info("No frontend served"),
    }

    if let Err(e) = hooks.try_run(POST_APP_RUN).await {
        if let Err(cleanup) = session.ledger().run().await {
            tracing::warn!(error = %cleanup, "cleanup after failed hook also failed");
        }
        return Err(e).context("Session stopped after start");
    }

    ui::info("Press Ctrl+C to stop");
    let outcome = session.finished().await;
    if outcome == ShutdownOutcome::Clean {
        ui::success("Stopped");
    }
    Ok(outcome)
}
