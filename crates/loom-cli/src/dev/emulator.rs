//! Local stand-in for the remote execution service.
//!
//! Bootstrapping is strictly sequential and fail-fast:
//!
//! 1. a Java runtime of a supported version is callable
//! 2. the docker CLI is callable
//! 3. the docker daemon is running
//! 4. the standalone emulator jar is present under the data directory,
//!    downloaded once if not
//! 5. the emulator is spawned and polled until its API answers
//! 6. the session config is pointed at fixed local credentials; child
//!    processes of a local session never inherit a remote identity
//! 7. the credentials are written to a temporary env file for debuggers
//!
//! Any failure aborts the whole bootstrap; there is no partial local mode.
//!
//! The downloaded jar is not checksummed. Pinning a digest next to
//! [`EMULATOR_DOWNLOAD_URL`] would close that gap.

use crate::config::AppConfig;
use crate::error::{DevError, DevResult, PreconditionError};
use crate::ui;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

pub const EMULATOR_DOWNLOAD_URL: &str =
    "https://github.com/apache/openwhisk/releases/download/1.0.0/openwhisk-standalone.jar";

pub const LOCAL_APIHOST: &str = "http://localhost:3233";
pub const LOCAL_NAMESPACE: &str = "guest";
pub const LOCAL_AUTH: &str =
    "23bc46b1-71f6-4ed5-8c54-816aa4f8c502:123zO3xZCLrMN6v2BKK1dXYFpXlPkccOFqm12CdAsMgRU4VrNZ9lyGVCGuMDGIwP";

/// Oldest Java major version the emulator runs on.
pub const MIN_JAVA_MAJOR: u32 = 11;

/// Environment variables that could carry a remote identity into a local session.
pub const REMOTE_IDENTITY_VARS: [&str; 3] = [
    "LOOM_RUNTIME_NAMESPACE",
    "LOOM_RUNTIME_AUTH",
    "LOOM_RUNTIME_APIHOST",
];

/// Credentials file read by debugger tooling, relative to the project root.
pub const DEBUG_ENV_FILE: &str = ".loom-debug.env.tmp";

/// Liveness polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub initial_wait: Duration,
    pub period: Duration,
    pub timeout: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_millis(2000),
            period: Duration::from_millis(500),
            timeout: Duration::from_millis(60_000),
        }
    }
}

/// Knobs for where the emulator comes from and how it is probed.
#[derive(Debug, Clone)]
pub struct EmulatorSettings {
    pub download_url: String,
    pub apihost: String,
    pub health: HealthPolicy,
}

impl Default for EmulatorSettings {
    fn default() -> Self {
        Self {
            download_url: EMULATOR_DOWNLOAD_URL.to_string(),
            apihost: LOCAL_APIHOST.to_string(),
            health: HealthPolicy::default(),
        }
    }
}

/// Captured result of a host tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs host tools for the precondition checks.
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// `Err` with `NotFound` means the program is not callable.
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<ProbeOutput>;
}

/// Probe that actually executes the program.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

#[async_trait]
impl HostProbe for SystemProbe {
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<ProbeOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;
        Ok(ProbeOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// The running emulator; lives exactly as long as one local session.
#[derive(Debug)]
pub struct EmulatorHandle {
    process: Child,
    pub apihost: String,
    pub namespace: String,
    pub auth_token: String,
    pub log_file: PathBuf,
    debug_env_file: PathBuf,
}

impl EmulatorHandle {
    /// Terminate the emulator and remove the generated credentials file.
    pub async fn cleanup(mut self) -> DevResult<()> {
        if let Err(e) = self.process.kill().await {
            // already exited on its own
            if self.process.try_wait()?.is_none() {
                return Err(e.into());
            }
        }

        match tokio::fs::remove_file(&self.debug_env_file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Brings up a local runtime for one session.
#[async_trait]
pub trait LocalRuntime: Send + Sync {
    /// Returns the config retargeted at the local runtime, plus its handle.
    async fn start(&self, config: &AppConfig) -> DevResult<(AppConfig, EmulatorHandle)>;
}

#[async_trait]
impl<P: HostProbe> LocalRuntime for LocalEmulator<P> {
    async fn start(&self, config: &AppConfig) -> DevResult<(AppConfig, EmulatorHandle)> {
        LocalEmulator::start(self, config).await
    }
}

/// Bootstraps the local emulator.
pub struct LocalEmulator<P = SystemProbe> {
    probe: P,
    settings: EmulatorSettings,
}

impl LocalEmulator<SystemProbe> {
    pub fn new() -> Self {
        Self::with_probe(SystemProbe)
    }
}

impl Default for LocalEmulator<SystemProbe> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: HostProbe> LocalEmulator<P> {
    pub fn with_probe(probe: P) -> Self {
        Self {
            probe,
            settings: EmulatorSettings::default(),
        }
    }

    pub fn settings(mut self, settings: EmulatorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Bring the emulator up and return a config pointed at it.
    pub async fn start(&self, config: &AppConfig) -> DevResult<(AppConfig, EmulatorHandle)> {
        self.check_preconditions().await?;

        let jar = jar_path(&config.data_dir);
        if jar.exists() {
            tracing::debug!(jar = %jar.display(), "emulator artifact already present");
        } else {
            ui::info(&format!("Downloading local runtime to {}", jar.display()));
            download(&self.settings.download_url, &jar).await?;
        }

        let log_file = jar.with_file_name("standalone.log");
        let mut process = spawn(&jar, &log_file)?;
        ui::info(&format!("Local runtime logs: {}", log_file.display()));

        let spinner = ui::Spinner::new("Waiting for the local runtime to start...");
        if let Err(e) = wait_for_health(&self.settings.apihost, &self.settings.health).await {
            spinner.fail("Local runtime did not start");
            if let Err(kill_err) = process.kill().await {
                tracing::warn!(error = %kill_err, "failed to stop unhealthy emulator");
            }
            return Err(e);
        }
        spinner.finish(&format!("Local runtime running at {}", self.settings.apihost));

        let local = local_config(config, &self.settings.apihost);
        let debug_env_file = config.root.join(DEBUG_ENV_FILE);
        if let Err(e) = write_debug_env(&debug_env_file, &local) {
            if let Err(kill_err) = process.kill().await {
                tracing::warn!(error = %kill_err, "failed to stop emulator");
            }
            return Err(e);
        }

        let handle = EmulatorHandle {
            process,
            apihost: local.runtime.apihost.clone(),
            namespace: local.runtime.namespace.clone(),
            auth_token: local.runtime.auth.clone(),
            log_file,
            debug_env_file,
        };
        Ok((local, handle))
    }

    /// Steps 1-3, in order, stopping at the first unmet one.
    pub async fn check_preconditions(&self) -> DevResult<()> {
        let java = self
            .probe
            .run("java", &["-version"])
            .await
            .ok()
            .filter(|out| out.success)
            .ok_or(PreconditionError::RuntimeMissing {
                required: MIN_JAVA_MAJOR,
            })?;

        // java prints its version banner on stderr
        let banner = if java.stderr.trim().is_empty() {
            &java.stdout
        } else {
            &java.stderr
        };
        match parse_java_major(banner) {
            Some(major) if major >= MIN_JAVA_MAJOR => {}
            _ => {
                let found = banner.lines().next().unwrap_or_default().trim().to_string();
                return Err(PreconditionError::RuntimeTooOld {
                    found,
                    required: MIN_JAVA_MAJOR,
                }
                .into());
            }
        }

        self.probe
            .run("docker", &["-v"])
            .await
            .ok()
            .filter(|out| out.success)
            .ok_or(PreconditionError::ContainerCliMissing)?;

        self.probe
            .run("docker", &["info"])
            .await
            .ok()
            .filter(|out| out.success)
            .ok_or(PreconditionError::ContainerDaemonDown)?;

        Ok(())
    }
}

/// Deterministic location of the emulator jar.
pub fn jar_path(data_dir: &Path) -> PathBuf {
    data_dir.join("openwhisk").join("openwhisk-standalone.jar")
}

/// Major version from a `java -version` banner.
///
/// Handles both `"1.8.0_292"` (major 8) and `"11.0.2"` / `"17"` styles.
pub fn parse_java_major(banner: &str) -> Option<u32> {
    let start = banner.find('"')? + 1;
    let end = start + banner[start..].find('"')?;
    let version = &banner[start..end];

    let mut parts = version.split(|c: char| c == '.' || c == '_' || c == '-' || c == '+');
    let first: u32 = parts.next()?.parse().ok()?;
    if first == 1 {
        parts.next()?.parse().ok()
    } else {
        Some(first)
    }
}

/// Stream `url` to `dest`, via a `.part` file renamed on completion.
pub async fn download(url: &str, dest: &Path) -> DevResult<()> {
    let fail = |source: Box<dyn std::error::Error + Send + Sync>| DevError::Download {
        url: url.to_string(),
        source,
    };

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = dest.with_extension("jar.part");

    let mut response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| fail(Box::new(e)))?;

    let mut file = tokio::fs::File::create(&partial).await?;
    let mut written: u64 = 0;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            Ok(None) => break,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(fail(Box::new(e)));
            }
        }
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&partial, dest).await?;
    tracing::debug!(bytes = written, dest = %dest.display(), "emulator artifact downloaded");
    Ok(())
}

fn spawn(jar: &Path, log_file: &Path) -> DevResult<Child> {
    let log = std::fs::File::create(log_file)?;
    let log_err = log.try_clone()?;

    let child = Command::new("java")
        .arg("-Dwhisk.concurrency-limit.max=10")
        .arg("-jar")
        .arg(jar)
        .arg("--no-ui")
        .arg("--disable-color-logging")
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .kill_on_drop(true)
        .spawn()?;

    tracing::debug!(pid = ?child.id(), "emulator spawned");
    Ok(child)
}

/// Poll `<apihost>/api/v1` until anything answers.
///
/// Any HTTP response counts as alive, whatever its status; only transport
/// errors (refused, reset, timed out) keep the poll going.
pub async fn wait_for_health(apihost: &str, policy: &HealthPolicy) -> DevResult<()> {
    let url = format!("{}/api/v1", apihost.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(policy.period.max(Duration::from_millis(250)))
        .build()
        .map_err(|e| DevError::Server(e.to_string()))?;

    let started = Instant::now();
    tokio::time::sleep(policy.initial_wait).await;

    loop {
        match client.get(&url).send().await {
            Ok(response) => {
                tracing::debug!(status = %response.status(), %url, "local runtime is alive");
                return Ok(());
            }
            Err(e) => tracing::trace!(error = %e, "local runtime not ready yet"),
        }

        if started.elapsed() + policy.period > policy.timeout {
            return Err(DevError::HealthTimeout {
                apihost: apihost.to_string(),
                timeout_ms: policy.timeout.as_millis() as u64,
            });
        }
        tokio::time::sleep(policy.period).await;
    }
}

/// Copy of `config` targeting the local emulator.
///
/// The copy is marked local, so service commands spawned for it drop
/// [`REMOTE_IDENTITY_VARS`]. The process environment itself is left alone.
pub fn local_config(config: &AppConfig, apihost: &str) -> AppConfig {
    let mut local = config.clone();
    local.runtime.namespace = LOCAL_NAMESPACE.to_string();
    local.runtime.auth = LOCAL_AUTH.to_string();
    local.runtime.apihost = apihost.to_string();
    local.runtime.local = true;
    local
}

/// Keep a child process from inheriting a remote identity.
pub fn scrub_remote_identity(command: &mut Command) -> &mut Command {
    for var in REMOTE_IDENTITY_VARS {
        command.env_remove(var);
    }
    command
}

/// Backup location used when a credentials file is already present.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Write the debugger credentials file.
///
/// An existing file is moved to [`backup_path`] first, unless a backup is
/// already there; an existing backup is never overwritten.
pub fn write_debug_env(path: &Path, config: &AppConfig) -> DevResult<()> {
    if path.exists() {
        let backup = backup_path(path);
        if backup.exists() {
            tracing::debug!(backup = %backup.display(), "keeping existing backup");
        } else {
            std::fs::rename(path, &backup)?;
        }
    }

    let content = format!(
        "# Generated by `loom run` for local debugging. Removed when the session stops.\n\
         NAMESPACE={}\n\
         AUTH={}\n\
         APIHOST={}\n",
        config.runtime.namespace, config.runtime.auth, config.runtime.apihost
    );
    std::fs::write(path, content)?;
    Ok(())
}
