//! Repository database access.
//!
//! The database (`<repo>.db.tar.gz` and friends) is read natively and written
//! only through pacman's own `repo-add` / `repo-remove` tools.

mod database;
pub(crate) mod desc;
mod repo_add;

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

pub use database::{PacmanDatabase, database_files, repository_name};
pub use repo_add::{DEFAULT_ADD_COMMAND, DEFAULT_REMOVE_COMMAND, RepoAddWriter};

/// One package recorded in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    /// Full `[epoch:]pkgver-pkgrel`
    pub version: String,
    /// Package file the entry was built from, when recorded
    pub filename: Option<String>,
}

impl IndexEntry {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            filename: None,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait IndexReader {
    /// Every entry of the database, keyed by package name.
    ///
    /// Fails with [`crate::Error::IndexUnreadable`]; `missing` tells a database
    /// that does not exist yet from a corrupt one.
    fn list_entries(&self) -> Result<BTreeMap<String, IndexEntry>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait IndexWriter {
    /// Add (or replace) the entry for the package stored in `package_file`.
    fn add_entry(&self, package_file: &Path) -> Result<()>;

    /// Drop the entry for `name`.
    fn remove_entry(&self, name: &str) -> Result<()>;
}
