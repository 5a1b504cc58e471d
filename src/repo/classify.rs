//! Per-package state classification.
//!
//! Every package name seen on disk, in the database or among installed
//! packages gets a set of [`Tag`]s. Tags are independent: a package can be a
//! duplicate and outdated at the same time.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::index::IndexEntry;
use crate::package::{PackageGroup, Version};
use crate::query::Upstream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    /// Disk, database and installed version agree
    InSync,
    /// The newest file is not what the database lists
    PendingAdd,
    /// The database lists a package with no file
    PendingRemove,
    /// More than one file of the package
    Duplicate,
    /// The registry has a newer version
    Outdated,
    /// The registry does not know the package
    Missing,
    /// Installed, but neither in the database nor on disk
    LocalOnly,
}

impl Tag {
    pub const ALL: [Tag; 7] = [
        Tag::InSync,
        Tag::PendingAdd,
        Tag::PendingRemove,
        Tag::Duplicate,
        Tag::Outdated,
        Tag::Missing,
        Tag::LocalOnly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::InSync => "in-sync",
            Tag::PendingAdd => "pending-add",
            Tag::PendingRemove => "pending-remove",
            Tag::Duplicate => "duplicate",
            Tag::Outdated => "outdated",
            Tag::Missing => "missing",
            Tag::LocalOnly => "local-only",
        }
    }

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of [`Tag`]s.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Tags(u8);

impl Tags {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, tag: Tag) {
        self.0 |= tag.bit();
    }

    pub fn contains(self, tag: Tag) -> bool {
        self.0 & tag.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Tag> {
        Tag::ALL.into_iter().filter(move |tag| self.contains(*tag))
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut tags = Tags::empty();
        for tag in iter {
            tags.insert(tag);
        }
        tags
    }
}

impl fmt::Debug for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(Tag::as_str).collect();
        f.write_str(&names.join(", "))
    }
}

/// Everything known about one package name.
#[derive(Debug, Clone)]
pub struct PackageStatus {
    pub name: String,
    pub tags: Tags,
    pub disk: Option<PackageGroup>,
    pub index: Option<IndexEntry>,
    pub installed: Option<String>,
    pub upstream: Upstream,
}

impl PackageStatus {
    pub fn has(&self, tag: Tag) -> bool {
        self.tags.contains(tag)
    }

    /// Version of the newest file on disk.
    pub fn disk_version(&self) -> Option<String> {
        self.disk.as_ref().map(|group| group.latest().full_version())
    }

    /// The version the repository stands for: the newest file, else the
    /// database entry, else the installed version.
    pub fn version(&self) -> Option<String> {
        self.disk_version()
            .or_else(|| self.index.as_ref().map(|entry| entry.version.clone()))
            .or_else(|| self.installed.clone())
    }
}

/// The four inputs of classification.
#[derive(Debug, Default)]
pub struct ClassifyInput {
    pub disk: BTreeMap<String, PackageGroup>,
    pub index: BTreeMap<String, IndexEntry>,
    /// `None` when installed packages were not queried
    pub installed: Option<BTreeMap<String, String>>,
    pub upstream: BTreeMap<String, Upstream>,
}

/// Classify every package name of `disk`, `index` and `installed`.
///
/// Names only the registry knows are left out.
pub fn classify(input: ClassifyInput) -> BTreeMap<String, PackageStatus> {
    let ClassifyInput {
        mut disk,
        mut index,
        installed,
        mut upstream,
    } = input;
    let mut installed = installed.unwrap_or_default();

    let mut names: Vec<String> = disk.keys().cloned().collect();
    names.extend(index.keys().cloned());
    names.extend(installed.keys().cloned());
    names.sort();
    names.dedup();

    names
        .into_iter()
        .map(|name| {
            let mut status = PackageStatus {
                tags: Tags::empty(),
                disk: disk.remove(&name),
                index: index.remove(&name),
                installed: installed.remove(&name),
                upstream: upstream.remove(&name).unwrap_or_default(),
                name,
            };
            status.tags = tags_of(&status);
            (status.name.clone(), status)
        })
        .collect()
}

fn tags_of(status: &PackageStatus) -> Tags {
    let mut tags = Tags::empty();
    let latest = status.disk_version();
    let indexed = status.index.as_ref().map(|entry| entry.version.as_str());

    // same version in two files: the database must name the one that is kept
    let indexed_file_replaced = match (&status.disk, &status.index) {
        (Some(group), Some(entry)) => entry
            .filename
            .as_deref()
            .is_some_and(|filename| filename != group.latest().filename()),
        _ => false,
    };
    if latest.is_some() && (latest.as_deref() != indexed || indexed_file_replaced) {
        tags.insert(Tag::PendingAdd);
    }
    if indexed.is_some() && status.disk.is_none() {
        tags.insert(Tag::PendingRemove);
    }
    if status.disk.as_ref().is_some_and(PackageGroup::has_duplicates) {
        tags.insert(Tag::Duplicate);
    }

    match (&status.upstream, latest.as_deref().or(indexed)) {
        (Upstream::Found(remote), Some(local))
            if Version::parse(remote) > Version::parse(local) =>
        {
            tags.insert(Tag::Outdated);
        }
        _ => {}
    }
    if latest.is_some() && status.upstream == Upstream::NotFound {
        tags.insert(Tag::Missing);
    }

    if status.installed.is_some() && indexed.is_none() && status.disk.is_none() {
        tags.insert(Tag::LocalOnly);
    }

    if let (Some(latest), Some(indexed)) = (&latest, indexed) {
        let installed_agrees = status
            .installed
            .as_deref()
            .is_none_or(|installed| installed == latest);
        if latest == indexed && !indexed_file_replaced && installed_agrees {
            tags.insert(Tag::InSync);
        }
    }

    tags
}

/// One filter term, as typed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Duplicates,
    Pending,
    Outdated,
    Missing,
    /// Installed on this machine
    Local,
    /// Installed, but neither in the database nor on disk
    LocalOnly,
    InSync,
}

impl Criterion {
    pub fn matches(self, status: &PackageStatus) -> bool {
        let tags = status.tags;
        match self {
            Criterion::Duplicates => tags.contains(Tag::Duplicate),
            Criterion::Pending => {
                tags.contains(Tag::PendingAdd) || tags.contains(Tag::PendingRemove)
            }
            Criterion::Outdated => tags.contains(Tag::Outdated),
            Criterion::Missing => tags.contains(Tag::Missing),
            Criterion::Local => status.installed.is_some(),
            Criterion::LocalOnly => tags.contains(Tag::LocalOnly),
            Criterion::InSync => tags.contains(Tag::InSync),
        }
    }

    fn needs_upstream(self) -> bool {
        matches!(self, Criterion::Outdated | Criterion::Missing)
    }

    fn needs_installed(self) -> bool {
        matches!(
            self,
            Criterion::Local | Criterion::LocalOnly | Criterion::InSync
        )
    }
}

impl FromStr for Criterion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "duplicates" | "duplicate" => Ok(Criterion::Duplicates),
            "pending" => Ok(Criterion::Pending),
            "outdated" => Ok(Criterion::Outdated),
            "missing" => Ok(Criterion::Missing),
            "local" => Ok(Criterion::Local),
            "local-only" => Ok(Criterion::LocalOnly),
            "in-sync" => Ok(Criterion::InSync),
            _ => Err(Error::InvalidCriterion(s.to_string())),
        }
    }
}

/// A conjunction of possibly negated criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    terms: Vec<(Criterion, bool)>,
}

impl Filter {
    /// Parse terms like `pending` or `!outdated`.
    pub fn parse<S: AsRef<str>>(terms: &[S]) -> Result<Self, Error> {
        let terms = terms
            .iter()
            .map(|term| {
                let term = term.as_ref();
                match term.strip_prefix('!') {
                    Some(positive) => positive
                        .parse()
                        .map(|criterion| (criterion, true))
                        .map_err(|_| Error::InvalidCriterion(term.to_string())),
                    None => term.parse().map(|criterion| (criterion, false)),
                }
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { terms })
    }

    /// True when every term holds; an empty filter matches everything.
    pub fn matches(&self, status: &PackageStatus) -> bool {
        self.terms
            .iter()
            .all(|(criterion, negated)| criterion.matches(status) != *negated)
    }

    pub fn needs_upstream(&self) -> bool {
        self.terms.iter().any(|(criterion, _)| criterion.needs_upstream())
    }

    pub fn needs_installed(&self) -> bool {
        self.terms.iter().any(|(criterion, _)| criterion.needs_installed())
    }
}
