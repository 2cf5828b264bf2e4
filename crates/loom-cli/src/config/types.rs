use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::defaults::*;

/// Presence flags for the two halves of an application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppFlags {
    #[serde(default)]
    pub has_frontend: bool,
    #[serde(default)]
    pub has_backend: bool,
}

/// Backend layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// Root of the backend sources; the change scheduler watches it
    #[serde(default = "default_actions_src")]
    pub src: PathBuf,

    /// Build output directory
    #[serde(default = "default_actions_dist")]
    pub dist: PathBuf,

    /// Independently buildable units
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<BuildUnit>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            src: default_actions_src(),
            dist: default_actions_dist(),
            units: Vec::new(),
        }
    }
}

/// One independently buildable and deployable backend function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildUnit {
    /// Unit name, unique within the project
    pub name: String,

    /// Owning group
    #[serde(default = "default_package")]
    pub package: String,

    /// Declared sources, each either a file or a folder
    pub sources: Vec<PathBuf>,

    /// Reachable over HTTP without credentials
    #[serde(default = "default_web")]
    pub web: bool,
}

impl BuildUnit {
    /// `package/name`, the key used in endpoint URL maps.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.package, self.name)
    }
}

/// Frontend layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_src")]
    pub src: PathBuf,

    /// Where the dev bundle is written and served from
    #[serde(default = "default_web_dist_dev")]
    pub dist_dev: PathBuf,

    /// JSON file holding the deployed endpoint URL map
    #[serde(default = "default_injected_config")]
    pub injected_config: PathBuf,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            src: default_web_src(),
            dist_dev: default_web_dist_dev(),
            injected_config: default_injected_config(),
        }
    }
}

/// Identity of the remote execution service a session deploys to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeTarget {
    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub auth: String,

    #[serde(default = "default_apihost")]
    pub apihost: String,

    /// Domain web units are served from when CDN URLs are requested
    #[serde(default = "default_cdn_domain")]
    pub cdn_domain: String,

    /// Set once the session targets the local emulator
    #[serde(skip)]
    pub local: bool,
}

impl Default for RuntimeTarget {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            auth: String::new(),
            apihost: default_apihost(),
            cdn_domain: default_cdn_domain(),
            local: false,
        }
    }
}

/// Shell commands backing [`crate::dev::CommandService`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCommands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<String>,

    /// Prints one `unit<TAB>timestamp<TAB>message` line per log entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}
