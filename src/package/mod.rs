//! Package files on disk
//!
//! This module parses package archive filenames, orders package versions and
//! groups the files of a repository directory by package name.

mod group;
mod identity;
mod scan;
mod version;

pub use group::PackageGroup;
pub use identity::{KNOWN_ARCHITECTURES, PackageIdentity, is_package_filename};
pub use scan::{MalformedFile, ScanResult, scan};
pub use version::{Version, segment_cmp, vercmp};
