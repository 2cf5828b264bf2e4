//! Boundary to the runtime build/deploy service.
//!
//! The dev loop never compiles or uploads anything itself; it drives an
//! [`ActionService`]. The binary ships [`CommandService`], which delegates to
//! shell commands declared in `loom.config.*`, and tests drive fakes.

use crate::config::AppConfig;
use crate::dev::emulator::scrub_remote_identity;
use crate::error::{DevError, DevResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;

/// Options for a deploy call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Restrict the deploy to these unit names; `None` deploys everything
    pub filter: Option<Vec<String>>,
}

/// One unit reported back by a deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedUnit {
    pub name: String,
    pub url: Option<String>,
    pub annotations: BTreeMap<String, String>,
}

/// Result of a deploy call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub units: Vec<DeployedUnit>,
}

/// One activation log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub unit: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub message: String,
}

/// The runtime build/deploy service collaborator.
#[async_trait]
pub trait ActionService: Send + Sync {
    /// Fail if the deploy target identity is incomplete.
    async fn check_credentials(&self, config: &AppConfig) -> DevResult<()>;

    /// Build units, all of them when `filter` is `None`.
    async fn build(
        &self,
        config: &AppConfig,
        filter: Option<&[String]>,
        force_build: bool,
    ) -> DevResult<()>;

    /// Deploy built units.
    async fn deploy(&self, config: &AppConfig, options: &DeployOptions) -> DevResult<DeployReport>;

    /// Current endpoint URL for every unit, keyed by `package/name`.
    async fn endpoint_urls(
        &self,
        config: &AppConfig,
        use_cdn: bool,
        is_local: bool,
    ) -> DevResult<BTreeMap<String, String>> {
        Ok(endpoint_url_map(config, use_cdn, is_local))
    }

    /// Log entries newer than `since` (ms since epoch).
    async fn fetch_logs(&self, _config: &AppConfig, _since: u64) -> DevResult<Vec<LogLine>> {
        Ok(Vec::new())
    }
}

/// Compute endpoint URLs from the deploy target and unit declarations.
///
/// Web units are served from `https://<namespace>.<cdn_domain>/api/v1/web/...`
/// when `use_cdn` is set, otherwise from the API host. A local session always
/// uses the API host, which the emulator bootstrap has pointed at localhost.
pub fn endpoint_url_map(config: &AppConfig, use_cdn: bool, is_local: bool) -> BTreeMap<String, String> {
    let runtime = &config.runtime;
    let apihost = runtime.apihost.trim_end_matches('/');

    config
        .actions
        .units
        .iter()
        .map(|unit| {
            let url = if !unit.web {
                format!(
                    "{}/api/v1/namespaces/{}/actions/{}/{}",
                    apihost, runtime.namespace, unit.package, unit.name
                )
            } else if use_cdn && !is_local {
                format!(
                    "https://{}.{}/api/v1/web/{}/{}",
                    runtime.namespace, runtime.cdn_domain, unit.package, unit.name
                )
            } else {
                format!(
                    "{}/api/v1/web/{}/{}/{}",
                    apihost, runtime.namespace, unit.package, unit.name
                )
            };
            (unit.qualified_name(), url)
        })
        .collect()
}

/// Service backed by the `service.*` shell commands of the project config.
///
/// Every command runs through `sh -c` in the project root with the deploy
/// target exported as `LOOM_NAMESPACE`, `LOOM_AUTH` and `LOOM_APIHOST`, and
/// the unit filter as a comma separated `LOOM_UNITS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandService;

impl CommandService {
    pub fn new() -> Self {
        Self
    }

    async fn run_script(
        config: &AppConfig,
        script: &str,
        env: &[(&str, String)],
    ) -> std::io::Result<std::process::Output> {
        tracing::debug!(%script, "running service command");
        let mut command = tokio::process::Command::new("sh");
        if config.runtime.local {
            scrub_remote_identity(&mut command);
        }
        command
            .arg("-c")
            .arg(script)
            .current_dir(&config.root)
            .env("LOOM_NAMESPACE", &config.runtime.namespace)
            .env("LOOM_AUTH", &config.runtime.auth)
            .env("LOOM_APIHOST", &config.runtime.apihost)
            .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(Stdio::null())
            .output()
            .await
    }

    fn failure_detail(output: &std::process::Output) -> String {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            format!("command exited with {}", output.status)
        } else {
            stderr.to_string()
        }
    }

    fn units_env(config: &AppConfig, filter: Option<&[String]>) -> String {
        match filter {
            Some(names) => names.join(","),
            None => config
                .actions
                .units
                .iter()
                .map(|u| u.qualified_name())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

#[async_trait]
impl ActionService for CommandService {
    async fn check_credentials(&self, config: &AppConfig) -> DevResult<()> {
        if config.runtime.namespace.trim().is_empty() {
            return Err(DevError::Credentials("runtime.namespace is not set".to_string()));
        }
        if config.runtime.auth.trim().is_empty() {
            return Err(DevError::Credentials("runtime.auth is not set".to_string()));
        }
        Ok(())
    }

    async fn build(
        &self,
        config: &AppConfig,
        filter: Option<&[String]>,
        force_build: bool,
    ) -> DevResult<()> {
        let Some(script) = config.service.build.as_deref() else {
            tracing::debug!("no service.build command, sources deploy as-is");
            return Ok(());
        };

        let env = [
            ("LOOM_UNITS", Self::units_env(config, filter)),
            ("LOOM_FORCE", force_build.to_string()),
        ];
        let output = Self::run_script(config, script, &env)
            .await
            .map_err(|e| DevError::Build(e.to_string()))?;
        if !output.status.success() {
            return Err(DevError::Build(Self::failure_detail(&output)));
        }
        Ok(())
    }

    async fn deploy(&self, config: &AppConfig, options: &DeployOptions) -> DevResult<DeployReport> {
        let script = config.service.deploy.as_deref().ok_or_else(|| {
            DevError::Deploy("no service.deploy command configured".to_string())
        })?;

        let env = [("LOOM_UNITS", Self::units_env(config, options.filter.as_deref()))];
        let output = Self::run_script(config, script, &env)
            .await
            .map_err(|e| DevError::Deploy(e.to_string()))?;
        if !output.status.success() {
            return Err(DevError::Deploy(Self::failure_detail(&output)));
        }

        let urls = endpoint_url_map(config, false, false);
        let units = config
            .actions
            .units
            .iter()
            .filter(|unit| {
                options
                    .filter
                    .as_ref()
                    .is_none_or(|names| {
                        names
                            .iter()
                            .any(|n| *n == unit.name || *n == unit.qualified_name())
                    })
            })
            .map(|unit| DeployedUnit {
                name: unit.qualified_name(),
                url: urls.get(&unit.qualified_name()).cloned(),
                annotations: BTreeMap::from([("web-export".to_string(), unit.web.to_string())]),
            })
            .collect();

        Ok(DeployReport { units })
    }

    async fn fetch_logs(&self, config: &AppConfig, since: u64) -> DevResult<Vec<LogLine>> {
        let Some(script) = config.service.logs.as_deref() else {
            return Ok(Vec::new());
        };

        let output = Self::run_script(config, script, &[("LOOM_SINCE", since.to_string())]).await?;
        if !output.status.success() {
            return Err(DevError::Io(std::io::Error::other(Self::failure_detail(&output))));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(parse_log_line)
            .collect())
    }
}

/// Parse `unit<TAB>timestamp<TAB>message`.
pub fn parse_log_line(line: &str) -> Option<LogLine> {
    let mut parts = line.splitn(3, '\t');
    let unit = parts.next()?.trim();
    let timestamp = parts.next()?.trim().parse().ok()?;
    let message = parts.next()?.to_string();
    if unit.is_empty() {
        return None;
    }
    Some(LogLine {
        unit: unit.to_string(),
        timestamp,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildUnit;
    use std::path::PathBuf;

    fn config(root: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::new(root);
        config.app.has_backend = true;
        config.runtime.namespace = "dev-ns".to_string();
        config.runtime.auth = "secret".to_string();
        config.runtime.apihost = "https://runtime.example.com/".to_string();
        config.runtime.cdn_domain = "static.example.com".to_string();
        config.actions.units = vec![
            BuildUnit {
                name: "action".to_string(),
                package: "app".to_string(),
                sources: vec![PathBuf::from("actions/action")],
                web: true,
            },
            BuildUnit {
                name: "action-zip".to_string(),
                package: "app".to_string(),
                sources: vec![PathBuf::from("actions/zip")],
                web: false,
            },
        ];
        config
    }

    #[test]
    fn test_endpoint_urls_with_cdn() {
        let urls = endpoint_url_map(&config(std::path::Path::new("/p")), true, false);
        assert_eq!(
            urls["app/action"],
            "https://dev-ns.static.example.com/api/v1/web/app/action"
        );
        assert_eq!(
            urls["app/action-zip"],
            "https://runtime.example.com/api/v1/namespaces/dev-ns/actions/app/action-zip"
        );
    }

    #[test]
    fn test_endpoint_urls_local_ignores_cdn() {
        let mut cfg = config(std::path::Path::new("/p"));
        cfg.runtime.apihost = "http://localhost:3233".to_string();
        let urls = endpoint_url_map(&cfg, true, true);
        assert_eq!(
            urls["app/action"],
            "http://localhost:3233/api/v1/web/dev-ns/app/action"
        );
    }

    #[test]
    fn test_parse_log_line() {
        let line = parse_log_line("app/action\t1700000000000\thello\tworld").unwrap();
        assert_eq!(line.unit, "app/action");
        assert_eq!(line.timestamp, 1_700_000_000_000);
        assert_eq!(line.message, "hello\tworld");

        assert!(parse_log_line("garbage").is_none());
        assert!(parse_log_line("app/action\tnot-a-number\tmsg").is_none());
        assert!(parse_log_line("\t1\tmsg").is_none());
    }

    #[tokio::test]
    async fn test_check_credentials() {
        let service = CommandService::new();
        let mut cfg = config(std::path::Path::new("/p"));
        assert!(service.check_credentials(&cfg).await.is_ok());

        cfg.runtime.auth.clear();
        let err = service.check_credentials(&cfg).await.unwrap_err();
        assert!(matches!(err, DevError::Credentials(_)));
    }

    #[tokio::test]
    async fn test_build_without_command_is_noop() {
        let temp = tempfile::TempDir::new().unwrap();
        let service = CommandService::new();
        assert!(service.build(&config(temp.path()), None, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_build_exports_units_and_reports_failure() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut cfg = config(temp.path());
        cfg.service.build = Some("echo \"$LOOM_UNITS $LOOM_FORCE\" > built.txt".to_string());

        let service = CommandService::new();
        service
            .build(&cfg, Some(&["action".to_string()]), true)
            .await
            .unwrap();
        let built = std::fs::read_to_string(temp.path().join("built.txt")).unwrap();
        assert_eq!(built.trim(), "action true");

        cfg.service.build = Some("echo 'syntax error in action' >&2; exit 3".to_string());
        let err = service.build(&cfg, None, false).await.unwrap_err();
        assert_eq!(err.to_string(), "Build failed: syntax error in action");
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_local_build_drops_remote_identity() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut cfg = config(temp.path());
        cfg.runtime.local = true;
        cfg.service.build =
            Some("echo \"${LOOM_RUNTIME_AUTH:-unset} $LOOM_NAMESPACE\" > built.txt".to_string());
        unsafe {
            std::env::set_var("LOOM_RUNTIME_AUTH", "prod-secret");
        }

        let result = CommandService::new().build(&cfg, None, false).await;

        unsafe {
            std::env::remove_var("LOOM_RUNTIME_AUTH");
        }
        result.unwrap();
        let built = std::fs::read_to_string(temp.path().join("built.txt")).unwrap();
        assert_eq!(built.trim(), "unset dev-ns");
    }

    #[tokio::test]
    async fn test_deploy_reports_filtered_units() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut cfg = config(temp.path());
        cfg.service.deploy = Some("true".to_string());

        let report = CommandService::new()
            .deploy(
                &cfg,
                &DeployOptions {
                    filter: Some(vec!["app/action-zip".to_string()]),
                },
            )
            .await
            .unwrap();

        assert_eq!(report.units.len(), 1);
        assert_eq!(report.units[0].name, "app/action-zip");
        assert_eq!(report.units[0].annotations["web-export"], "false");
    }

    #[tokio::test]
    async fn test_deploy_requires_command() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = CommandService::new()
            .deploy(&config(temp.path()), &DeployOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DevError::Deploy(_)));
    }

    #[tokio::test]
    async fn test_fetch_logs_parses_output() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut cfg = config(temp.path());
        cfg.service.logs = Some("printf 'app/action\\t%s\\tstarted\\n' \"$LOOM_SINCE\"".to_string());

        let lines = CommandService::new().fetch_logs(&cfg, 42).await.unwrap();
        assert_eq!(
            lines,
            vec![LogLine {
                unit: "app/action".to_string(),
                timestamp: 42,
                message: "started".to_string(),
            }]
        );
    }
}
