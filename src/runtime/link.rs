//! Symlink inspection. Package directories may contain links to package
//! files kept elsewhere; they are resolved one level only.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::RealRuntime;
use super::path::normalize_path;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn is_symlink_impl(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn resolve_link_impl(&self, path: &Path) -> Result<PathBuf> {
        let target = fs::read_link(path)
            .with_context(|| format!("Failed to read symlink {}", path.display()))?;
        if target.is_absolute() {
            return Ok(target);
        }
        let parent = path
            .parent()
            .context("Failed to get parent directory of symlink")?;
        Ok(normalize_path(&parent.join(target)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_relative_link_one_level() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let store = dir.path().join("store");
        std::fs::create_dir_all(&store).unwrap();
        std::fs::write(store.join("foo-1.0-1-any.pkg.tar.zst"), b"").unwrap();

        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        let link = repo.join("foo-1.0-1-any.pkg.tar.zst");
        symlink("../store/foo-1.0-1-any.pkg.tar.zst", &link).unwrap();

        assert!(runtime.is_symlink(&link));
        assert!(!runtime.is_symlink(&store));
        assert_eq!(
            runtime.resolve_link(&link).unwrap(),
            store.join("foo-1.0-1-any.pkg.tar.zst")
        );
    }

    #[test]
    fn test_resolve_does_not_follow_chains() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let target = dir.path().join("real.pkg.tar");
        std::fs::write(&target, b"").unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        symlink(&target, &first).unwrap();
        symlink(&first, &second).unwrap();

        assert_eq!(runtime.resolve_link(&second).unwrap(), first);
        assert_eq!(runtime.resolve_link(&first).unwrap(), target);
    }
}
