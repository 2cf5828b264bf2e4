//! Error handling for the Loom CLI.
//!
//! The hierarchy mirrors the failure classes of a development session:
//! - **Top-level errors** (`CliError`) are what commands return to `main`
//! - **Session errors** (`DevError`) come from the dev loop components
//! - **Precondition errors** (`PreconditionError`) describe host tooling that
//!   must be fixed by the user before a local session can start
//! - **Configuration errors** (`ConfigError`) come from loading `loom.config.*`
//!
//! Conversion is automatic via `#[from]`, and [`ResultExt::context`] names the
//! step that failed on any error that converts into [`CliError`].

pub mod miette;

pub use self::miette::cli_error_to_miette;

use std::path::PathBuf;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration-related errors (file not found, invalid syntax, etc.)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors raised while starting or running a development session
    #[error(transparent)]
    Dev(#[from] DevError),

    /// Invalid command-line arguments or options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error prefixed with the step that produced it
    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<CliError>,
    },
}

/// Errors produced by the development loop.
#[derive(Debug, Error)]
pub enum DevError {
    /// A host tool required by the local emulator is missing or unusable
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// The emulator artifact could not be fetched
    #[error("Failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The emulator did not answer its liveness endpoint in time
    #[error("Local runtime at {apihost} did not become healthy within {timeout_ms}ms")]
    HealthTimeout { apihost: String, timeout_ms: u64 },

    /// Deploy credentials are missing or rejected
    #[error("Missing deploy credentials: {0}\n\nHint: Set runtime.namespace and runtime.auth, or use --local")]
    Credentials(String),

    /// Backend build failed
    #[error("Build failed: {0}")]
    Build(String),

    /// Backend deploy failed
    #[error("Deploy failed: {0}")]
    Deploy(String),

    /// Frontend bundling failed
    #[error("Bundling failed: {0}")]
    Bundle(String),

    /// A configured hook script failed
    #[error("Hook '{name}' failed: {detail}")]
    Hook { name: String, detail: String },

    /// Frontend server errors
    #[error("Server error: {0}")]
    Server(String),

    /// File watching errors
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// A registered teardown step failed
    #[error("Cleanup step '{label}' failed: {source}")]
    Cleanup {
        label: String,
        #[source]
        source: Box<DevError>,
    },

    /// I/O errors from file system or process operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Host preconditions for the local emulator, checked in this order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreconditionError {
    /// No Java runtime on PATH
    #[error("Java runtime not found\n\nHint: Install Java {required} or newer and make sure `java` is on your PATH")]
    RuntimeMissing { required: u32 },

    /// Java runtime is present but too old
    #[error("Java {found} is not supported\n\nHint: Install Java {required} or newer")]
    RuntimeTooOld { found: String, required: u32 },

    /// No docker CLI on PATH
    #[error("Docker CLI not found\n\nHint: Install Docker and make sure `docker` is on your PATH")]
    ContainerCliMissing,

    /// The docker CLI exists but the daemon is not answering
    #[error("Docker is installed but the daemon is not running\n\nHint: Start Docker and try again")]
    ContainerDaemonDown,
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file doesn't exist at the expected location
    #[error("Config file not found: {}\n\nHint: Create a loom.config.toml file or specify --config <path>", .0.display())]
    NotFound(PathBuf),

    /// Missing required configuration field
    #[error("Missing required field: {field}\n\nHint: {hint}")]
    MissingField {
        /// Name of the missing field
        field: String,
        /// Helpful hint for providing the field
        hint: String,
    },

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The invalid value
        value: String,
        /// Helpful hint for correct values
        hint: String,
    },

    /// Figment could not extract the merged configuration
    #[error("Failed to load configuration: {0}\n\nHint: Check loom.config.* syntax and field types")]
    Extract(String),
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Result alias for the dev loop components.
pub type DevResult<T> = std::result::Result<T, DevError>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Prefix the error with the step that failed.
    ///
    /// ```rust,no_run
    /// # use loom_cli::error::{Result, ResultExt};
    /// # fn run() -> Result<()> {
    /// std::fs::read_to_string("index.html").context("Reading the frontend entry")?;
    /// # Ok(())
    /// # }
    /// ```
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| CliError::Context {
            message: msg.to_string(),
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_messages_carry_hints() {
        let errors = [
            PreconditionError::RuntimeMissing { required: 11 },
            PreconditionError::RuntimeTooOld {
                found: "1.8.0".to_string(),
                required: 11,
            },
            PreconditionError::ContainerCliMissing,
            PreconditionError::ContainerDaemonDown,
        ];

        for err in errors {
            assert!(err.to_string().contains("Hint:"), "{err}");
        }
    }

    #[test]
    fn test_health_timeout_mentions_timeout() {
        let err = DevError::HealthTimeout {
            apihost: "http://localhost:3233".to_string(),
            timeout_ms: 60_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("60000ms"));
        assert!(msg.contains("http://localhost:3233"));
    }

    #[test]
    fn test_cleanup_error_keeps_source() {
        let err = DevError::Cleanup {
            label: "frontend server".to_string(),
            source: Box::new(DevError::Server("socket busy".to_string())),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Server error: socket busy"));
    }

    #[test]
    fn test_cli_error_from_dev_error_is_transparent() {
        let cli_err: CliError = DevError::Build("syntax error".to_string()).into();
        assert!(matches!(cli_err, CliError::Dev(_)));
        assert_eq!(cli_err.to_string(), "Build failed: syntax error");
    }

    #[test]
    fn test_config_error_missing_field() {
        let err = ConfigError::MissingField {
            field: "actions.units".to_string(),
            hint: "Declare at least one unit".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Missing required field: actions.units"));
        assert!(msg.contains("Hint: Declare at least one unit"));
    }

    #[test]
    fn test_result_ext_context() {
        let result: std::result::Result<(), DevError> =
            Err(DevError::Deploy("403".to_string()));

        let err = result.context("Initial deploy").unwrap_err();
        assert_eq!(err.to_string(), "Initial deploy: Deploy failed: 403");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Deploy failed: 403"));
    }
}
