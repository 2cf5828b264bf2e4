//! Development session orchestration.
//!
//! Brings up, in order: the backend (credentials or local runtime, initial
//! build and deploy, change scheduler), the frontend (injected endpoint URLs,
//! bundle, serve) and the optional log poller. Every acquired resource is
//! registered on the session's [`ResourceLedger`]; if any step fails the
//! ledger is unwound before the error is returned, so a session never
//! half-starts.

use crate::config::AppConfig;
use crate::dev::bundler::Bundler;
use crate::dev::emulator::{LocalEmulator, LocalRuntime};
use crate::dev::hooks::{HookRunner, BUILD_STATIC, SERVE_STATIC};
use crate::dev::ledger::{ResourceLedger, ShutdownHandle, ShutdownOutcome};
use crate::dev::logs::LogPoller;
use crate::dev::scheduler::{ChangeScheduler, ServiceRedeploy, WatchedUnit};
use crate::dev::server::{FrontendServer, ServeOptions};
use crate::dev::service::{ActionService, DeployOptions};
use crate::error::DevResult;
use crate::ui;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// How a session should run.
#[derive(Debug, Clone, Default)]
pub struct DevOptions {
    /// Use the local emulator instead of the remote deploy target
    pub local: bool,
    /// Never build, deploy or watch the backend
    pub skip_actions: bool,
    /// Never bundle or serve the frontend
    pub skip_serve: bool,
    /// Preferred frontend port; 0 lets the OS pick
    pub port: u16,
    pub fetch_logs: bool,
    pub serve: ServeOptions,
}

/// A started session.
#[derive(Debug)]
pub struct DevSession {
    /// URL of the served frontend, if one was actually served
    pub frontend_url: Option<String>,
    /// Effective configuration: local credentials in local mode, and
    /// `app.has_frontend` cleared when nothing was served
    pub config: AppConfig,
    ledger: Arc<ResourceLedger>,
    shutdown: Option<ShutdownHandle>,
}

impl DevSession {
    pub fn ledger(&self) -> &Arc<ResourceLedger> {
        &self.ledger
    }

    /// Wait until the session has been shut down and unwound.
    pub async fn finished(self) -> ShutdownOutcome {
        match self.shutdown {
            Some(handle) => handle.finished().await,
            None => match self.ledger.run().await {
                Ok(()) => ShutdownOutcome::Clean,
                Err(e) => {
                    ui::error(&format!("Error while cleaning up: {}", e));
                    ShutdownOutcome::CleanupFailed
                }
            },
        }
    }
}

/// Runs development sessions against a set of collaborators.
pub struct DevCoordinator {
    service: Arc<dyn ActionService>,
    bundler: Arc<dyn Bundler>,
    hooks: Arc<dyn HookRunner>,
    emulator: Arc<dyn LocalRuntime>,
}

impl DevCoordinator {
    pub fn new(
        service: Arc<dyn ActionService>,
        bundler: Arc<dyn Bundler>,
        hooks: Arc<dyn HookRunner>,
    ) -> Self {
        Self {
            service,
            bundler,
            hooks,
            emulator: Arc::new(LocalEmulator::new()),
        }
    }

    /// Replace the local runtime used in `--local` mode.
    pub fn with_emulator(mut self, emulator: Arc<dyn LocalRuntime>) -> Self {
        self.emulator = emulator;
        self
    }

    /// Start a session that shuts down on the next interrupt.
    pub async fn run(&self, config: &AppConfig, options: &DevOptions) -> DevResult<DevSession> {
        let (ledger, frontend_url, config) = self.start(config, options).await?;
        let shutdown = ledger.wait();
        Ok(DevSession {
            frontend_url,
            config,
            ledger,
            shutdown,
        })
    }

    /// Start a session that shuts down when `trigger` resolves.
    pub async fn run_until<F>(
        &self,
        config: &AppConfig,
        options: &DevOptions,
        trigger: F,
    ) -> DevResult<DevSession>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (ledger, frontend_url, config) = self.start(config, options).await?;
        let shutdown = ledger.wait_until(trigger);
        Ok(DevSession {
            frontend_url,
            config,
            ledger,
            shutdown,
        })
    }

    async fn start(
        &self,
        config: &AppConfig,
        options: &DevOptions,
    ) -> DevResult<(Arc<ResourceLedger>, Option<String>, AppConfig)> {
        let ledger = Arc::new(ResourceLedger::new());
        match self.acquire(config, options, &ledger).await {
            Ok((url, config)) => Ok((ledger, url, config)),
            Err(e) => {
                tracing::debug!(error = %e, "session failed to start, releasing resources");
                if let Err(cleanup) = ledger.run().await {
                    tracing::warn!(error = %cleanup, "cleanup after failed start also failed");
                }
                Err(e)
            }
        }
    }

    async fn acquire(
        &self,
        config: &AppConfig,
        options: &DevOptions,
        ledger: &ResourceLedger,
    ) -> DevResult<(Option<String>, AppConfig)> {
        let mut config = config.clone();

        // 1. backend
        if config.app.has_backend && !options.skip_actions {
            if options.local {
                let (local, emulator) = self.emulator.start(&config).await?;
                ledger.add("local runtime", move || emulator.cleanup());
                config = local;
            } else {
                self.service.check_credentials(&config).await?;
            }

            let spinner = ui::Spinner::new("Building actions...");
            let deployed = async {
                self.service.build(&config, None, false).await?;
                spinner.set_message("Deploying actions...");
                self.service.deploy(&config, &DeployOptions::default()).await
            }
            .await;
            let report = match deployed {
                Ok(report) => report,
                Err(e) => {
                    spinner.fail("Actions failed to deploy");
                    return Err(e);
                }
            };
            spinner.finish(&format!("Deployed {} action(s)", report.units.len()));
            for unit in &report.units {
                if let Some(url) = &unit.url {
                    ui::info(&format!("  {} -> {}", unit.name, url));
                }
            }

            let scheduler = ChangeScheduler::start(
                &config.actions_src(),
                WatchedUnit::resolve(&config.root, &config.actions.units),
                Arc::new(ServiceRedeploy::new(self.service.clone(), config.clone())),
            )?;
            ledger.add("change scheduler", move || scheduler.cleanup());
        }

        // 2. frontend
        let mut frontend_url = None;
        if config.app.has_frontend {
            if config.app.has_backend {
                let urls = self
                    .service
                    .endpoint_urls(&config, !options.local, options.local)
                    .await?;
                write_injected_config(&config.injected_config_path(), &urls).await?;
            }

            if !options.skip_serve {
                let dist = config.web_dist();
                if !self.hooks.try_run(BUILD_STATIC).await? {
                    self.bundler.bundle(&config.web_src(), &dist).await?;
                }
                if !self.hooks.try_run(SERVE_STATIC).await? {
                    let server = FrontendServer::serve(&dist, options.port, &options.serve).await?;
                    frontend_url = Some(server.url().to_string());
                    ledger.add("frontend server", move || server.cleanup());
                }
            }
        }

        // 3. nothing served means no frontend for anything downstream
        if frontend_url.is_none() {
            config.app.has_frontend = false;
        }

        // 4. logs
        if config.app.has_backend && options.fetch_logs {
            let poller = LogPoller::start(
                self.service.clone(),
                config.clone(),
                Duration::from_millis(config.fetch_log_interval_ms),
            );
            ledger.add("log poller", move || async move { poller.cleanup() });
        }

        Ok((frontend_url, config))
    }
}

/// Write the endpoint map the frontend reads at runtime.
pub async fn write_injected_config(path: &Path, urls: &BTreeMap<String, String>) -> DevResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(urls)?;
    tokio::fs::write(path, json).await?;
    tracing::debug!(path = %path.display(), endpoints = urls.len(), "injected endpoint config");
    Ok(())
}
