//! Named override points.
//!
//! Every place the dev loop lets a project replace a default step goes
//! through [`HookRunner::try_run`]: if a hook with that name is configured it
//! runs and the default step is skipped.

use crate::config::AppConfig;
use crate::dev::emulator::scrub_remote_identity;
use crate::error::{DevError, DevResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const PRE_APP_RUN: &str = "pre-app-run";
pub const POST_APP_RUN: &str = "post-app-run";
pub const BUILD_STATIC: &str = "build-static";
pub const SERVE_STATIC: &str = "serve-static";

/// Capability to run a named hook.
#[async_trait]
pub trait HookRunner: Send + Sync {
    /// Run the hook called `name` if one is configured.
    ///
    /// Returns `Ok(true)` if it ran, `Ok(false)` if there is no such hook.
    async fn try_run(&self, name: &str) -> DevResult<bool>;
}

/// Hooks declared in the `[hooks]` table, executed with `sh -c` in the project root.
#[derive(Debug, Clone)]
pub struct ScriptHooks {
    scripts: BTreeMap<String, String>,
    cwd: PathBuf,
    local: bool,
}

impl ScriptHooks {
    pub fn new(scripts: BTreeMap<String, String>, cwd: PathBuf) -> Self {
        Self {
            scripts,
            cwd,
            local: false,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.hooks.clone(), config.root.clone()).local(config.runtime.local)
    }

    /// Hooks of a local session run without any remote identity variables.
    pub fn local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }
}

#[async_trait]
impl HookRunner for ScriptHooks {
    async fn try_run(&self, name: &str) -> DevResult<bool> {
        let Some(script) = self.scripts.get(name) else {
            return Ok(false);
        };

        tracing::info!(hook = %name, "running hook");
        let mut command = tokio::process::Command::new("sh");
        if self.local {
            scrub_remote_identity(&mut command);
        }
        let status = command
            .arg("-c")
            .arg(script)
            .current_dir(&self.cwd)
            .status()
            .await
            .map_err(|e| DevError::Hook {
                name: name.to_string(),
                detail: e.to_string(),
            })?;

        if !status.success() {
            return Err(DevError::Hook {
                name: name.to_string(),
                detail: format!("exited with {}", status),
            });
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hooks(entries: &[(&str, &str)], cwd: &std::path::Path) -> ScriptHooks {
        ScriptHooks::new(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            cwd.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn test_missing_hook_does_not_run() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(!hooks(&[], temp.path()).try_run(BUILD_STATIC).await.unwrap());
    }

    #[tokio::test]
    async fn test_hook_runs_in_project_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = hooks(&[(PRE_APP_RUN, "touch ran-pre")], temp.path());

        assert!(runner.try_run(PRE_APP_RUN).await.unwrap());
        assert!(temp.path().join("ran-pre").exists());
    }

    #[tokio::test]
    async fn test_failing_hook_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = hooks(&[(SERVE_STATIC, "exit 2")], temp.path());

        let err = runner.try_run(SERVE_STATIC).await.unwrap_err();
        assert!(err.to_string().starts_with("Hook 'serve-static' failed"));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_local_hooks_drop_remote_identity() {
        let temp = tempfile::TempDir::new().unwrap();
        let script = "printf %s \"${LOOM_RUNTIME_NAMESPACE:-unset}\" > ns.txt";
        unsafe {
            std::env::set_var("LOOM_RUNTIME_NAMESPACE", "prod-ns");
        }

        hooks(&[(PRE_APP_RUN, script)], temp.path())
            .try_run(PRE_APP_RUN)
            .await
            .unwrap();
        let remote = std::fs::read_to_string(temp.path().join("ns.txt")).unwrap();

        hooks(&[(PRE_APP_RUN, script)], temp.path())
            .local(true)
            .try_run(PRE_APP_RUN)
            .await
            .unwrap();
        let local = std::fs::read_to_string(temp.path().join("ns.txt")).unwrap();

        unsafe {
            std::env::remove_var("LOOM_RUNTIME_NAMESPACE");
        }
        assert_eq!(remote, "prod-ns");
        assert_eq!(local, "unset");
    }
}
