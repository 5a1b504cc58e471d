use anyhow::Result;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::runtime::Runtime;

use super::group::PackageGroup;
use super::identity::{PackageIdentity, is_package_filename};

/// A file with a package extension whose name could not be parsed.
#[derive(Debug)]
pub struct MalformedFile {
    pub path: PathBuf,
    pub error: Error,
}

/// Package files found in a repository directory.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Package name -> files of that package
    pub groups: BTreeMap<String, PackageGroup>,
    pub malformed: Vec<MalformedFile>,
}

impl ScanResult {
    pub fn group(&self, name: &str) -> Option<&PackageGroup> {
        self.groups.get(name)
    }
}

/// Scan the flat repository directory `dir` for package files.
///
/// Directory structure: `<dir>/<name>-<version>-<release>-<arch>.pkg.tar[.comp]`
///
/// Subdirectories are not entered. A symlink counts when it points directly
/// at a regular file; chains of links are not followed. A missing directory
/// scans as empty.
#[tracing::instrument(skip(runtime))]
pub fn scan<R: Runtime>(runtime: &R, dir: &Path) -> Result<ScanResult> {
    let mut result = ScanResult::default();

    if !runtime.exists(dir) {
        debug!("Repository directory {:?} does not exist", dir);
        return Ok(result);
    }

    let mut entries = runtime.read_dir(dir)?;
    entries.sort();

    for path in entries {
        let Some(filename) = path.file_name().and_then(|s| s.to_str()) else {
            debug!("Skipping non UTF-8 entry {:?}", path);
            continue;
        };
        if !is_package_filename(filename) {
            debug!("Skipping {:?}: not a package file", path);
            continue;
        }
        if !is_package_file(runtime, &path) {
            continue;
        }

        match PackageIdentity::from_path(&path) {
            Ok(identity) => {
                if !identity.is_known_architecture() {
                    debug!("{:?} has unusual architecture {}", path, identity.architecture);
                }
                match result.groups.get_mut(&identity.name) {
                    Some(group) => group.insert(identity),
                    None => {
                        result
                            .groups
                            .insert(identity.name.clone(), PackageGroup::new(identity));
                    }
                }
            }
            Err(error) => {
                debug!("Malformed package file {:?}: {}", path, error);
                result.malformed.push(MalformedFile { path, error });
            }
        }
    }

    debug!(
        "Scanned {:?}: {} package(s), {} malformed file(s)",
        dir,
        result.groups.len(),
        result.malformed.len()
    );
    Ok(result)
}

fn is_package_file<R: Runtime>(runtime: &R, path: &Path) -> bool {
    if !runtime.is_symlink(path) {
        return runtime.is_file(path);
    }

    match runtime.resolve_link(path) {
        Ok(target) if runtime.is_symlink(&target) => {
            warn!(
                "Skipping {:?}: links to another link {:?}",
                path, target
            );
            false
        }
        Ok(target) if runtime.is_file(&target) => true,
        Ok(target) => {
            warn!("Skipping {:?}: link target {:?} is not a file", path, target);
            false
        }
        Err(e) => {
            warn!("Skipping {:?}: {}", path, e);
            false
        }
    }
}
