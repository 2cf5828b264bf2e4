//! Application configuration for a Loom project.
//!
//! Merges settings from environment variables and `loom.config.toml` /
//! `loom.config.json`. Priority: Environment > File > Defaults.
//!
//! The dev loop only ever reads an [`AppConfig`]; the local emulator
//! bootstrap hands back a corrected copy with local credentials.

mod defaults;
mod loading;
mod tests;
mod types;
mod validation;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use defaults::*;
pub use loading::{CONFIG_FILE_JSON, CONFIG_FILE_TOML};
pub use types::*;

/// Loom configuration - loaded from `loom.config.*` and `LOOM_*` variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Project root; every relative path below resolves against it
    #[serde(skip)]
    pub root: PathBuf,

    /// Which halves of the application exist
    #[serde(default)]
    pub app: AppFlags,

    /// Backend build units
    #[serde(default)]
    pub actions: ActionsConfig,

    /// Frontend sources and outputs
    #[serde(default)]
    pub web: WebConfig,

    /// Deploy target identity
    #[serde(default)]
    pub runtime: RuntimeTarget,

    /// Named hook scripts (`pre-app-run`, `build-static`, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hooks: BTreeMap<String, String>,

    /// Commands used by the command-driven build/deploy service
    #[serde(default)]
    pub service: ServiceCommands,

    /// Tool data directory (emulator artifacts live here)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log poller interval
    #[serde(default = "default_fetch_log_interval_ms")]
    pub fetch_log_interval_ms: u64,
}

impl AppConfig {
    /// An empty project rooted at `root`: no frontend, no backend.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            app: AppFlags::default(),
            actions: ActionsConfig::default(),
            web: WebConfig::default(),
            runtime: RuntimeTarget::default(),
            hooks: BTreeMap::new(),
            service: ServiceCommands::default(),
            data_dir: default_data_dir(),
            fetch_log_interval_ms: default_fetch_log_interval_ms(),
        }
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Backend source directory, absolute.
    pub fn actions_src(&self) -> PathBuf {
        self.resolve(&self.actions.src)
    }

    /// Frontend source directory, absolute.
    pub fn web_src(&self) -> PathBuf {
        self.resolve(&self.web.src)
    }

    /// Frontend dev output directory, absolute.
    pub fn web_dist(&self) -> PathBuf {
        self.resolve(&self.web.dist_dev)
    }

    /// File the bundled frontend reads endpoint URLs from, absolute.
    pub fn injected_config_path(&self) -> PathBuf {
        self.resolve(&self.web.injected_config)
    }
}
