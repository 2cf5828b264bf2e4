use crate::config::AppConfig;
use crate::error::{ConfigError, Result};
use figment::{
    providers::{Env, Format as _, Json, Serialized, Toml},
    Figment,
};
use std::path::Path;

pub const CONFIG_FILE_TOML: &str = "loom.config.toml";
pub const CONFIG_FILE_JSON: &str = "loom.config.json";

impl AppConfig {
    /// Load configuration from multiple sources.
    /// Priority: environment variables > config file > defaults
    ///
    /// Without an explicit path, `loom.config.toml` then `loom.config.json`
    /// are looked up in `root`; a project with neither gets the defaults
    /// (no frontend, no backend).
    pub fn load(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::new(root)));

        let config_file = match config_path {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    root.join(path)
                };
                if !path.exists() {
                    return Err(ConfigError::NotFound(path).into());
                }
                Some(path)
            }
            None => [CONFIG_FILE_TOML, CONFIG_FILE_JSON]
                .iter()
                .map(|name| root.join(name))
                .find(|candidate| candidate.exists()),
        };

        if let Some(path) = config_file {
            tracing::debug!("Loading configuration from {}", path.display());
            figment = if path.extension().is_some_and(|ext| ext == "json") {
                figment.merge(Json::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }

        // LOOM_APP__HAS_BACKEND=true, LOOM_FETCH_LOG_INTERVAL_MS=5000, ...
        figment = figment.merge(
            Env::prefixed("LOOM_")
                .filter(|key| !key.as_str().to_ascii_lowercase().starts_with("runtime_"))
                .split("__"),
        );

        // The remote identity variables map flat onto the runtime table
        figment = figment.merge(
            Env::prefixed("LOOM_RUNTIME_")
                .map(|key| format!("runtime.{}", key.as_str().to_ascii_lowercase()).into()),
        );

        let mut config: Self = figment
            .extract()
            .map_err(|e| ConfigError::Extract(e.to_string()))?;
        config.root = root.to_path_buf();
        Ok(config)
    }
}
