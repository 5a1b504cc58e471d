//! Lexical path helpers.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // At the root `..` has nowhere to go, keep it
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Whether `file` sits directly inside `dir`, compared lexically.
///
/// An empty parent (a bare filename) is taken relative to `cwd`.
pub fn same_directory(file: &Path, dir: &Path, cwd: &Path) -> bool {
    let absolute = |p: &Path| {
        if p.is_absolute() {
            normalize_path(p)
        } else {
            normalize_path(&cwd.join(p))
        }
    };
    match file.parent() {
        Some(parent) => absolute(parent) == absolute(dir),
        None => absolute(cwd) == absolute(dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/srv/repo/./pkgs/../foo.pkg.tar")),
            PathBuf::from("/srv/repo/foo.pkg.tar")
        );
        assert_eq!(normalize_path(Path::new("/..")), PathBuf::from("/.."));
        assert_eq!(normalize_path(Path::new("a/b/..")), PathBuf::from("a"));
    }

    #[test]
    fn test_same_directory() {
        let cwd = Path::new("/home/user");
        let repo = Path::new("/srv/repo");

        assert!(same_directory(Path::new("/srv/repo/foo.pkg.tar"), repo, cwd));
        assert!(same_directory(
            Path::new("/srv/other/../repo/foo.pkg.tar"),
            repo,
            cwd
        ));
        assert!(!same_directory(Path::new("/srv/foo.pkg.tar"), repo, cwd));
        assert!(!same_directory(Path::new("foo.pkg.tar"), repo, cwd));
        assert!(same_directory(
            Path::new("foo.pkg.tar"),
            repo,
            Path::new("/srv/repo")
        ));
        assert!(same_directory(
            Path::new("../repo/foo.pkg.tar"),
            repo,
            Path::new("/srv/build")
        ));
    }
}
