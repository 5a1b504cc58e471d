//! Package filename parsing.
//!
//! A package archive is named `name-pkgver-pkgrel-arch.pkg.tar[.comp]`. The
//! name may itself contain dashes, so the three trailing fields are split off
//! from the right.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Error;

use super::version::Version;

/// Marker that every package archive extension starts with.
const PACKAGE_MARKER: &str = ".pkg.tar";

/// Compression suffixes makepkg can produce after `.pkg.tar`.
const COMPRESSION_SUFFIXES: &[&str] = &["gz", "bz2", "xz", "zst", "lrz", "lzo", "lz4", "lz", "Z"];

/// Architecture tags pacman ships with. Anything else is still accepted.
pub const KNOWN_ARCHITECTURES: &[&str] = &["any", "x86_64", "i686", "aarch64", "armv7h"];

/// Identity of one package archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub name: String,
    /// `pkgver`, including the epoch when there is one (`1:2.0`)
    pub version: String,
    pub release: String,
    pub architecture: String,
    /// Archive suffix starting at `.pkg.tar`
    pub extension: String,
    /// Where the file was found
    pub path: PathBuf,
}

/// Extension part of `filename` when it names a package archive.
fn package_extension(filename: &str) -> Option<&str> {
    let start = filename.rfind(PACKAGE_MARKER)?;
    let extension = &filename[start..];
    match &extension[PACKAGE_MARKER.len()..] {
        "" => Some(extension),
        rest => rest
            .strip_prefix('.')
            .filter(|suffix| COMPRESSION_SUFFIXES.contains(suffix))
            .map(|_| extension),
    }
}

/// Whether `filename` carries a package archive extension.
///
/// Signatures (`.pkg.tar.zst.sig`), the database and anything else in the
/// repository directory are not packages.
pub fn is_package_filename(filename: &str) -> bool {
    package_extension(filename).is_some_and(|ext| ext.len() < filename.len())
}

impl PackageIdentity {
    /// Parse a bare filename. The resulting `path` is the filename itself.
    pub fn parse(filename: &str) -> Result<Self, Error> {
        Self::parse_at(filename, PathBuf::from(filename))
    }

    /// Parse the filename component of `path`.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::malformed(path.display().to_string(), "not a UTF-8 filename"))?;
        Self::parse_at(filename, path.to_path_buf())
    }

    fn parse_at(filename: &str, path: PathBuf) -> Result<Self, Error> {
        let extension = package_extension(filename)
            .ok_or_else(|| Error::malformed(filename, "missing .pkg.tar extension"))?;
        let stem = &filename[..filename.len() - extension.len()];

        let mut fields = stem.rsplitn(4, '-');
        let (Some(architecture), Some(release), Some(version), Some(name)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(Error::malformed(
                filename,
                "expected name-version-release-architecture",
            ));
        };

        for (field, value) in [
            ("name", name),
            ("version", version),
            ("release", release),
            ("architecture", architecture),
        ] {
            if value.is_empty() {
                return Err(Error::malformed(filename, format!("empty {} field", field)));
            }
        }

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            architecture: architecture.to_string(),
            extension: extension.to_string(),
            path,
        })
    }

    /// `version-release`, the form the database records.
    pub fn full_version(&self) -> String {
        format!("{}-{}", self.version, self.release)
    }

    pub fn parsed_version(&self) -> Version {
        Version::parse(&self.full_version())
    }

    /// Canonical filename; identical to the parsed input.
    pub fn filename(&self) -> String {
        self.to_string()
    }

    pub fn is_known_architecture(&self) -> bool {
        KNOWN_ARCHITECTURES.contains(&self.architecture.as_str())
    }

    /// Total order used to pick the newest file of a package: version, then
    /// the raw release text, then the path so that the result never depends
    /// on directory listing order.
    pub fn newness_cmp(&self, other: &Self) -> Ordering {
        self.parsed_version()
            .cmp(&other.parsed_version())
            .then_with(|| self.release.cmp(&other.release))
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}{}",
            self.name, self.version, self.release, self.architecture, self.extension
        )
    }
}
