use anyhow::Result;
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::OnceCell;

use crate::index::desc::Desc;
use crate::runtime::Runtime;

use super::LocalQuery;

/// pacman's database of installed packages.
pub const DEFAULT_PACMAN_DB: &str = "/var/lib/pacman/local";

/// Answers installed-version queries from `<pacman_db>/*/desc`.
///
/// The directory is read once, on the first query.
pub struct PacmanLocal<'a, R: Runtime> {
    runtime: &'a R,
    root: PathBuf,
    installed: OnceCell<BTreeMap<String, String>>,
}

impl<'a, R: Runtime> PacmanLocal<'a, R> {
    pub fn new(runtime: &'a R, root: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            root: root.into(),
            installed: OnceCell::new(),
        }
    }

    fn load(&self) -> BTreeMap<String, String> {
        let mut installed = BTreeMap::new();
        let entries = match self.runtime.read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read local package database: {:#}", e);
                return installed;
            }
        };

        for dir in entries {
            let desc_path = dir.join("desc");
            if !self.runtime.is_file(&desc_path) {
                continue;
            }
            let content = match self.runtime.read_to_string(&desc_path) {
                Ok(content) => content,
                Err(e) => {
                    debug!("Skipping {:?}: {:#}", desc_path, e);
                    continue;
                }
            };
            let desc = Desc::parse(&content);
            if let (Some(name), Some(version)) = (desc.get("NAME"), desc.get("VERSION")) {
                installed.insert(name.to_string(), version.to_string());
            }
        }

        debug!("{} package(s) installed according to {:?}", installed.len(), self.root);
        installed
    }
}

#[async_trait]
impl<'a, R: Runtime> LocalQuery for PacmanLocal<'a, R> {
    async fn installed_version(&self, name: &str) -> Result<Option<String>> {
        let installed = self
            .installed
            .get_or_init(|| async { self.load() })
            .await;
        Ok(installed.get(name).cloned())
    }
}
