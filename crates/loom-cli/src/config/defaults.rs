use std::path::PathBuf;

pub fn default_actions_src() -> PathBuf {
    PathBuf::from("actions")
}

pub fn default_actions_dist() -> PathBuf {
    PathBuf::from("dist/actions")
}

pub fn default_package() -> String {
    "default".to_string()
}

pub fn default_web() -> bool {
    true
}

pub fn default_web_src() -> PathBuf {
    PathBuf::from("web-src")
}

pub fn default_web_dist_dev() -> PathBuf {
    PathBuf::from("dist/web-dev")
}

pub fn default_injected_config() -> PathBuf {
    PathBuf::from("web-src/src/config.json")
}

pub fn default_apihost() -> String {
    "https://runtime.loom.dev".to_string()
}

pub fn default_cdn_domain() -> String {
    "static.loom.dev".to_string()
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("loom")
}

pub fn default_fetch_log_interval_ms() -> u64 {
    10_000
}

/// Frontend port requested when `--port` is not given.
pub fn default_port() -> u16 {
    9080
}
