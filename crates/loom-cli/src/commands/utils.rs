//! Shared utilities for command implementations.

use crate::config::{CONFIG_FILE_JSON, CONFIG_FILE_TOML};
use crate::error::{CliError, Result};
use std::path::{Path, PathBuf};

/// Resolve a path relative to a working directory.
///
/// If the path is absolute, returns it unchanged.
pub fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Get the current working directory.
///
/// # Errors
///
/// Returns I/O error if current directory cannot be determined.
pub fn get_cwd() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| {
        CliError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to get current directory: {}", e),
        ))
    })
}

/// Find the nearest directory holding a Loom config file, walking up.
pub fn find_config_root(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .find(|dir| dir.join(CONFIG_FILE_TOML).is_file() || dir.join(CONFIG_FILE_JSON).is_file())
        .map(Path::to_path_buf)
}

/// Determine the project root.
///
/// 1. `--cwd`, which must be an existing directory
/// 2. the nearest ancestor of the current directory with a config file
/// 3. the current directory
pub fn resolve_project_root(explicit_cwd: Option<&Path>) -> Result<PathBuf> {
    use crate::ui;

    let current_dir = get_cwd()?;

    if let Some(cwd_path) = explicit_cwd {
        let absolute = resolve_path(cwd_path, &current_dir);

        if !absolute.exists() {
            return Err(CliError::InvalidArgument(format!(
                "Specified --cwd directory does not exist: {}",
                absolute.display()
            )));
        }
        if !absolute.is_dir() {
            return Err(CliError::InvalidArgument(format!(
                "Specified --cwd is not a directory: {}",
                absolute.display()
            )));
        }
        return Ok(absolute);
    }

    if let Some(root) = find_config_root(&current_dir) {
        if root != current_dir {
            ui::info(&format!("Using project root: {}", root.display()));
        }
        return Ok(root);
    }

    tracing::debug!(dir = %current_dir.display(), "no config file found, using current directory");
    Ok(current_dir)
}
