use super::identity::PackageIdentity;

/// All on-disk files of one package name, oldest first.
///
/// A group is never empty; the last file is the authoritative one and every
/// other file is obsolete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageGroup {
    name: String,
    files: Vec<PackageIdentity>,
}

impl PackageGroup {
    pub fn new(first: PackageIdentity) -> Self {
        Self {
            name: first.name.clone(),
            files: vec![first],
        }
    }

    /// Build a group from files of the same package; `None` when empty.
    pub fn from_files(files: impl IntoIterator<Item = PackageIdentity>) -> Option<Self> {
        let mut files = files.into_iter();
        let mut group = Self::new(files.next()?);
        for file in files {
            group.insert(file);
        }
        Some(group)
    }

    pub(crate) fn insert(&mut self, file: PackageIdentity) {
        debug_assert_eq!(file.name, self.name);
        let at = self
            .files
            .partition_point(|existing| existing.newness_cmp(&file).is_lt());
        self.files.insert(at, file);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every file, oldest first.
    pub fn files(&self) -> &[PackageIdentity] {
        &self.files
    }

    pub fn latest(&self) -> &PackageIdentity {
        // Non-empty by construction
        &self.files[self.files.len() - 1]
    }

    /// Files superseded by [`latest`](Self::latest).
    pub fn obsolete(&self) -> &[PackageIdentity] {
        &self.files[..self.files.len() - 1]
    }

    pub fn has_duplicates(&self) -> bool {
        self.files.len() > 1
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.files.len()
    }
}
