use std::path::PathBuf;

use thiserror::Error;

/// Typed failures of the reconciliation engine.
///
/// Most code passes these around inside `anyhow::Error`; callers that apply a
/// policy (e.g. "a missing index is an empty index") downcast to this type.
#[derive(Error, Debug)]
pub enum Error {
    /// A file with a package extension whose name does not parse
    #[error("malformed package filename {filename:?}: {reason}")]
    MalformedFilename { filename: String, reason: String },

    /// The repository database is missing or cannot be decoded
    #[error("cannot read repository database {}: {reason}", path.display())]
    IndexUnreadable {
        path: PathBuf,
        missing: bool,
        reason: String,
    },

    #[error("registry unavailable for {name}: {reason}")]
    RegistryUnavailable { name: String, reason: String },

    #[error("query for {name} cancelled after {seconds}s")]
    QueryCancelled { name: String, seconds: u64 },

    #[error("{name}: {cause}")]
    MutationFailed { name: String, cause: String },

    #[error("unknown operation {0:?}")]
    UnknownOperation(String),

    #[error(
        "invalid filter criterion {0:?} (expected duplicates, pending, outdated, missing, local or in-sync, optionally prefixed with '!')"
    )]
    InvalidCriterion(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn malformed(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedFilename {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    /// True for an index that does not exist yet, as opposed to a corrupt one.
    pub fn is_missing_index(&self) -> bool {
        matches!(self, Error::IndexUnreadable { missing: true, .. })
    }
}

/// Result type alias using the crate's typed error
pub type Result<T> = std::result::Result<T, Error>;
