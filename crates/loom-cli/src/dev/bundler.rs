//! Frontend bundling seam.
//!
//! Bundler internals are not part of the dev loop. [`StaticBundler`] is the
//! default: it mirrors the frontend source tree into the dev output
//! directory so it can be served as-is.

use crate::error::{DevError, DevResult};
use async_trait::async_trait;
use std::path::Path;
use walkdir::WalkDir;

/// Produces a servable frontend in `dist` from the sources in `src`.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(&self, src: &Path, dist: &Path) -> DevResult<()>;
}

/// Copy-through bundler; hidden files and `node_modules` are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticBundler;

impl StaticBundler {
    fn copy_tree(src: &Path, dist: &Path) -> DevResult<usize> {
        if !src.is_dir() {
            return Err(DevError::Bundle(format!(
                "frontend source directory not found: {}",
                src.display()
            )));
        }

        std::fs::create_dir_all(dist)?;
        let mut copied = 0;

        let walker = WalkDir::new(src).into_iter().filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            entry.depth() == 0 || !(name.starts_with('.') || name == "node_modules")
        });

        for entry in walker {
            let entry = entry.map_err(|e| DevError::Bundle(e.to_string()))?;
            let rel = match entry.path().strip_prefix(src) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel,
                _ => continue,
            };
            let target = dist.join(rel);

            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)?;
            } else if entry.file_type().is_file() {
                std::fs::copy(entry.path(), &target)?;
                copied += 1;
            }
        }

        Ok(copied)
    }
}

#[async_trait]
impl Bundler for StaticBundler {
    async fn bundle(&self, src: &Path, dist: &Path) -> DevResult<()> {
        let (src, dist) = (src.to_path_buf(), dist.to_path_buf());
        let copied = tokio::task::spawn_blocking(move || Self::copy_tree(&src, &dist))
            .await
            .map_err(|e| DevError::Bundle(e.to_string()))??;
        tracing::debug!(files = copied, "frontend bundled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_bundle_copies_tree() {
        let temp = tempfile::TempDir::new().unwrap();
        let src = temp.path().join("web-src");
        fs::create_dir_all(src.join("src")).unwrap();
        fs::create_dir_all(src.join("node_modules/react")).unwrap();
        fs::write(src.join("index.html"), "<html></html>").unwrap();
        fs::write(src.join("src/config.json"), "{}").unwrap();
        fs::write(src.join(".env"), "SECRET=1").unwrap();
        fs::write(src.join("node_modules/react/index.js"), "").unwrap();

        let dist = temp.path().join("dist/web-dev");
        StaticBundler.bundle(&src, &dist).await.unwrap();

        assert!(dist.join("index.html").exists());
        assert!(dist.join("src/config.json").exists());
        assert!(!dist.join(".env").exists());
        assert!(!dist.join("node_modules").exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_bundle_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = StaticBundler
            .bundle(&temp.path().join("nope"), &temp.path().join("dist"))
            .await
            .unwrap_err();
        assert!(matches!(err, DevError::Bundle(_)));
    }
}
