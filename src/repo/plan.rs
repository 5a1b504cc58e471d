//! Turning an operation into an ordered list of mutations.

use anyhow::Result;
use log::debug;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::index::{IndexEntry, database_files};
use crate::package::{PackageIdentity, ScanResult, is_package_filename};
use crate::runtime::{Runtime, same_directory};

use super::classify::{ClassifyInput, Tag, classify};

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Add(Vec<AddTarget>),
    Remove(Vec<String>),
    Update,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddTarget {
    /// A package file, inside or outside the repository directory
    File(PathBuf),
    /// The newest file of this name already in the repository
    Name(String),
}

impl AddTarget {
    /// Paths and package filenames are files; anything else is a name.
    pub fn parse(arg: &str) -> Self {
        if arg.contains(std::path::MAIN_SEPARATOR) || arg.contains('/') || is_package_filename(arg)
        {
            AddTarget::File(PathBuf::from(arg))
        } else {
            AddTarget::Name(arg.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    #[default]
    Copy,
    Move,
}

/// One step that changes the filesystem or the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Import {
        name: String,
        from: PathBuf,
        to: PathBuf,
        mode: ImportMode,
    },
    IndexAdd {
        name: String,
        file: PathBuf,
    },
    IndexRemove {
        name: String,
    },
    Delete {
        name: String,
        file: PathBuf,
    },
    Backup {
        name: String,
        file: PathBuf,
        to: PathBuf,
    },
    ClearIndex {
        path: PathBuf,
    },
}

impl Mutation {
    /// The package this mutation belongs to. Clearing the database belongs
    /// to the database file.
    pub fn subject(&self) -> String {
        match self {
            Mutation::Import { name, .. }
            | Mutation::IndexAdd { name, .. }
            | Mutation::IndexRemove { name }
            | Mutation::Delete { name, .. }
            | Mutation::Backup { name, .. } => name.clone(),
            Mutation::ClearIndex { path } => file_name(path),
        }
    }

    /// Destructive mutations are confirmed in interactive mode.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Mutation::IndexRemove { .. }
                | Mutation::Delete { .. }
                | Mutation::Backup { .. }
                | Mutation::ClearIndex { .. }
        )
    }

    /// Later mutations of the same package depend on database mutations.
    pub fn is_index(&self) -> bool {
        matches!(
            self,
            Mutation::IndexAdd { .. } | Mutation::IndexRemove { .. } | Mutation::ClearIndex { .. }
        )
    }

    /// Question asked before a destructive mutation.
    pub fn prompt(&self) -> String {
        match self {
            Mutation::Import { from, to, mode, .. } => match mode {
                ImportMode::Copy => format!("Copy {} to {}?", from.display(), to.display()),
                ImportMode::Move => format!("Move {} to {}?", from.display(), to.display()),
            },
            Mutation::IndexAdd { file, .. } => {
                format!("Add {} to the database?", file_name(file))
            }
            Mutation::IndexRemove { name } => format!("Remove {} from the database?", name),
            Mutation::Delete { file, .. } => format!("Delete {}?", file.display()),
            Mutation::Backup { file, to, .. } => {
                format!("Back up {} to {}?", file.display(), to.display())
            }
            Mutation::ClearIndex { path } => format!("Clear database {}?", path.display()),
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Import { from, to, mode, .. } => {
                let verb = match mode {
                    ImportMode::Copy => "copying",
                    ImportMode::Move => "moving",
                };
                write!(f, "{} {} to {}", verb, from.display(), to.display())
            }
            Mutation::IndexAdd { file, .. } => {
                write!(f, "adding {} to the database", file_name(file))
            }
            Mutation::IndexRemove { name } => write!(f, "removing {} from the database", name),
            Mutation::Delete { file, .. } => write!(f, "deleting {}", file.display()),
            Mutation::Backup { file, to, .. } => {
                write!(f, "backing up {} to {}", file.display(), to.display())
            }
            Mutation::ClearIndex { path } => write!(f, "clearing database {}", path.display()),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// How obsolete files are discarded and packages imported.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    /// Move discarded files here instead of deleting them
    pub backup_dir: Option<PathBuf>,
    pub interactive: bool,
    pub import_mode: ImportMode,
}

/// Mutations in execution order, plus targets that could not be planned.
#[derive(Debug, Default)]
pub struct Plan {
    pub mutations: Vec<Mutation>,
    pub failures: Vec<Error>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.failures.is_empty()
    }

    fn fail(&mut self, name: impl Into<String>, cause: impl Into<String>) {
        self.failures.push(Error::MutationFailed {
            name: name.into(),
            cause: cause.into(),
        });
    }
}

/// Computes mutations for one repository.
pub struct Planner<'a, R: Runtime> {
    runtime: &'a R,
    repo_dir: &'a Path,
    database: &'a Path,
    policy: &'a Policy,
}

impl<'a, R: Runtime> Planner<'a, R> {
    pub fn new(runtime: &'a R, repo_dir: &'a Path, database: &'a Path, policy: &'a Policy) -> Self {
        Self {
            runtime,
            repo_dir,
            database,
            policy,
        }
    }

    #[tracing::instrument(skip(self, scan, index))]
    pub fn plan(
        &self,
        operation: &Operation,
        scan: &ScanResult,
        index: &BTreeMap<String, IndexEntry>,
    ) -> Result<Plan> {
        let mut plan = Plan::default();
        match operation {
            Operation::Update => self.plan_update(&mut plan, scan, index),
            Operation::Reset => {
                let exists = database_files(self.database)
                    .iter()
                    .any(|path| self.runtime.exists(path) || self.runtime.is_symlink(path));
                if exists {
                    plan.mutations.push(Mutation::ClearIndex {
                        path: self.database.to_path_buf(),
                    });
                }
                self.plan_update(&mut plan, scan, &BTreeMap::new());
            }
            Operation::Add(targets) => {
                let cwd = self.runtime.current_dir()?;
                for target in targets {
                    self.plan_add(&mut plan, target, scan, &cwd);
                }
            }
            Operation::Remove(names) => {
                for name in names {
                    self.plan_remove(&mut plan, name, scan, index);
                }
            }
        }
        debug!(
            "Planned {} mutation(s), {} failure(s)",
            plan.mutations.len(),
            plan.failures.len()
        );
        Ok(plan)
    }

    fn plan_update(
        &self,
        plan: &mut Plan,
        scan: &ScanResult,
        index: &BTreeMap<String, IndexEntry>,
    ) {
        let statuses = classify(ClassifyInput {
            disk: scan.groups.clone(),
            index: index.clone(),
            ..Default::default()
        });

        for status in statuses.values() {
            if let (true, Some(group)) = (status.has(Tag::PendingAdd), &status.disk) {
                plan.mutations.push(Mutation::IndexAdd {
                    name: status.name.clone(),
                    file: group.latest().path.clone(),
                });
            }
            if let (true, Some(group)) = (status.has(Tag::Duplicate), &status.disk) {
                for file in group.obsolete() {
                    self.discard(plan, &status.name, &file.path);
                }
            }
            if status.has(Tag::PendingRemove) {
                plan.mutations.push(Mutation::IndexRemove {
                    name: status.name.clone(),
                });
            }
        }
    }

    fn plan_add(&self, plan: &mut Plan, target: &AddTarget, scan: &ScanResult, cwd: &Path) {
        let (name, file) = match target {
            AddTarget::Name(name) => match scan.group(name) {
                Some(group) => (name.clone(), group.latest().path.clone()),
                None => {
                    plan.fail(name, "no package file of that name in the repository");
                    return;
                }
            },
            AddTarget::File(path) => {
                let identity = match PackageIdentity::from_path(path) {
                    Ok(identity) => identity,
                    Err(e) => {
                        plan.fail(path.display().to_string(), e.to_string());
                        return;
                    }
                };
                if !self.runtime.is_file(path) {
                    plan.fail(&identity.name, format!("{} is not a file", path.display()));
                    return;
                }
                let dest = self.repo_dir.join(identity.filename());
                if !same_directory(path, self.repo_dir, cwd) {
                    self.import(plan, &identity.name, path, &dest);
                }
                (identity.name, dest)
            }
        };

        plan.mutations.push(Mutation::IndexAdd {
            name: name.clone(),
            file: file.clone(),
        });

        let keep = file.file_name();
        if let Some(group) = scan.group(&name) {
            for other in group.files() {
                if other.path.file_name() != keep {
                    self.discard(plan, &name, &other.path);
                }
            }
        }
    }

    fn plan_remove(
        &self,
        plan: &mut Plan,
        name: &str,
        scan: &ScanResult,
        index: &BTreeMap<String, IndexEntry>,
    ) {
        let group = scan.group(name);
        if group.is_none() && !index.contains_key(name) {
            plan.fail(name, "not in the repository");
            return;
        }
        if index.contains_key(name) {
            plan.mutations.push(Mutation::IndexRemove {
                name: name.to_string(),
            });
        }
        for file in group.map(|g| g.files()).unwrap_or_default() {
            self.discard(plan, name, &file.path);
        }
    }

    fn import(&self, plan: &mut Plan, name: &str, from: &Path, to: &Path) {
        for (from, to) in with_signature(self.runtime, from, to) {
            plan.mutations.push(Mutation::Import {
                name: name.to_string(),
                from,
                to,
                mode: self.policy.import_mode,
            });
        }
    }

    /// Delete `file`, or back it up when backups are on. An existing
    /// signature goes the same way.
    fn discard(&self, plan: &mut Plan, name: &str, file: &Path) {
        let files = match &self.policy.backup_dir {
            Some(dir) => with_signature(self.runtime, file, &dir.join(file_name(file))),
            None => with_signature(self.runtime, file, file),
        };
        for (file, to) in files {
            let mutation = match &self.policy.backup_dir {
                Some(_) => Mutation::Backup {
                    name: name.to_string(),
                    to: backup_path(&to),
                    file,
                },
                None => Mutation::Delete {
                    name: name.to_string(),
                    file,
                },
            };
            plan.mutations.push(mutation);
        }
    }
}

/// `(from, to)` for a package file, followed by its detached signature when
/// one exists.
fn with_signature<R: Runtime>(runtime: &R, from: &Path, to: &Path) -> Vec<(PathBuf, PathBuf)> {
    let mut pairs = vec![(from.to_path_buf(), to.to_path_buf())];
    let sig = signature_path(from);
    if runtime.exists(&sig) {
        pairs.push((sig, signature_path(to)));
    }
    pairs
}

fn signature_path(path: &Path) -> PathBuf {
    let mut sig = path.as_os_str().to_os_string();
    sig.push(".sig");
    PathBuf::from(sig)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut backup = path.as_os_str().to_os_string();
    backup.push(".bak");
    PathBuf::from(backup)
}

/// Parse the arguments of `add`.
pub fn add_targets<S: AsRef<str>>(args: &[S]) -> Vec<AddTarget> {
    args.iter().map(|arg| AddTarget::parse(arg.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageGroup;
    use crate::runtime::MockRuntime;

    const REPO: &str = "/srv/repo";
    const DB: &str = "/srv/repo/repo.db.tar.gz";

    fn scan_of(files: &[&str]) -> ScanResult {
        let mut scan = ScanResult::default();
        for file in files {
            let identity = PackageIdentity::from_path(&Path::new(REPO).join(file)).unwrap();
            match scan.groups.get_mut(&identity.name) {
                Some(group) => group.insert(identity),
                None => {
                    scan.groups
                        .insert(identity.name.clone(), PackageGroup::new(identity));
                }
            }
        }
        scan
    }

    fn index_of(entries: &[(&str, &str)]) -> BTreeMap<String, IndexEntry> {
        entries
            .iter()
            .map(|(name, version)| (name.to_string(), IndexEntry::new(*name, *version)))
            .collect()
    }

    /// Runtime where nothing but the listed paths exists.
    fn runtime_with(existing: &[&str]) -> MockRuntime {
        let existing: Vec<PathBuf> = existing.iter().map(PathBuf::from).collect();
        let files = existing.clone();
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .returning(move |p| existing.iter().any(|e| e == p));
        runtime
            .expect_is_file()
            .returning(move |p| files.iter().any(|e| e == p));
        runtime.expect_is_symlink().returning(|_| false);
        runtime
            .expect_current_dir()
            .returning(|| Ok(PathBuf::from("/home/user")));
        runtime
    }

    fn repo(file: &str) -> PathBuf {
        Path::new(REPO).join(file)
    }

    #[test]
    fn test_update_orders_per_name() {
        let runtime = runtime_with(&[]);
        let policy = Policy::default();
        let planner = Planner::new(&runtime, Path::new(REPO), Path::new(DB), &policy);

        let scan = scan_of(&[
            "a-1.0-1-any.pkg.tar.zst",
            "a-1.1-1-any.pkg.tar.zst",
            "c-1.0-1-any.pkg.tar.zst",
        ]);
        let index = index_of(&[("a", "1.0-1"), ("b", "1.0-1"), ("c", "1.0-1")]);

        let plan = planner.plan(&Operation::Update, &scan, &index).unwrap();
        assert!(plan.failures.is_empty());
        assert_eq!(
            plan.mutations,
            vec![
                Mutation::IndexAdd {
                    name: "a".into(),
                    file: repo("a-1.1-1-any.pkg.tar.zst"),
                },
                Mutation::Delete {
                    name: "a".into(),
                    file: repo("a-1.0-1-any.pkg.tar.zst"),
                },
                Mutation::IndexRemove { name: "b".into() },
            ]
        );
    }

    #[test]
    fn test_update_with_nothing_to_do() {
        let runtime = runtime_with(&[]);
        let policy = Policy::default();
        let planner = Planner::new(&runtime, Path::new(REPO), Path::new(DB), &policy);

        let scan = scan_of(&["a-1.0-1-any.pkg.tar.zst"]);
        let index = index_of(&[("a", "1.0-1")]);
        let plan = planner.plan(&Operation::Update, &scan, &index).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_update_reindexes_before_discarding_indexed_file() {
        let runtime = runtime_with(&[]);
        let policy = Policy::default();
        let planner = Planner::new(&runtime, Path::new(REPO), Path::new(DB), &policy);

        let scan = scan_of(&[
            "pkg-1.1-2-x86_64.pkg.tar.xz",
            "pkg-1.1-2-x86_64.pkg.tar.zst",
        ]);
        let mut index = index_of(&[("pkg", "1.1-2")]);
        if let Some(entry) = index.get_mut("pkg") {
            entry.filename = Some("pkg-1.1-2-x86_64.pkg.tar.xz".to_string());
        }

        let plan = planner.plan(&Operation::Update, &scan, &index).unwrap();
        assert_eq!(
            plan.mutations,
            vec![
                Mutation::IndexAdd {
                    name: "pkg".into(),
                    file: repo("pkg-1.1-2-x86_64.pkg.tar.zst"),
                },
                Mutation::Delete {
                    name: "pkg".into(),
                    file: repo("pkg-1.1-2-x86_64.pkg.tar.xz"),
                },
            ]
        );
    }

    #[test]
    fn test_backup_policy_and_signatures() {
        let runtime = runtime_with(&["/srv/repo/a-1.0-1-any.pkg.tar.zst.sig"]);
        let policy = Policy {
            backup_dir: Some(PathBuf::from("/srv/repo/backup")),
            ..Default::default()
        };
        let planner = Planner::new(&runtime, Path::new(REPO), Path::new(DB), &policy);

        let scan = scan_of(&["a-1.0-1-any.pkg.tar.zst", "a-1.1-1-any.pkg.tar.zst"]);
        let index = index_of(&[("a", "1.1-1")]);

        let plan = planner.plan(&Operation::Update, &scan, &index).unwrap();
        assert_eq!(
            plan.mutations,
            vec![
                Mutation::Backup {
                    name: "a".into(),
                    file: repo("a-1.0-1-any.pkg.tar.zst"),
                    to: PathBuf::from("/srv/repo/backup/a-1.0-1-any.pkg.tar.zst.bak"),
                },
                Mutation::Backup {
                    name: "a".into(),
                    file: repo("a-1.0-1-any.pkg.tar.zst.sig"),
                    to: PathBuf::from("/srv/repo/backup/a-1.0-1-any.pkg.tar.zst.sig.bak"),
                },
            ]
        );
        assert!(plan.mutations.iter().all(Mutation::is_destructive));
    }

    #[test]
    fn test_add_external_file() {
        let runtime = runtime_with(&["/tmp/build/a-2.0-1-any.pkg.tar.zst"]);
        let policy = Policy {
            import_mode: ImportMode::Move,
            ..Default::default()
        };
        let planner = Planner::new(&runtime, Path::new(REPO), Path::new(DB), &policy);

        let scan = scan_of(&["a-1.0-1-any.pkg.tar.zst"]);
        let operation = Operation::Add(add_targets(&["/tmp/build/a-2.0-1-any.pkg.tar.zst"]));
        let plan = planner.plan(&operation, &scan, &index_of(&[])).unwrap();

        assert_eq!(
            plan.mutations,
            vec![
                Mutation::Import {
                    name: "a".into(),
                    from: PathBuf::from("/tmp/build/a-2.0-1-any.pkg.tar.zst"),
                    to: repo("a-2.0-1-any.pkg.tar.zst"),
                    mode: ImportMode::Move,
                },
                Mutation::IndexAdd {
                    name: "a".into(),
                    file: repo("a-2.0-1-any.pkg.tar.zst"),
                },
                Mutation::Delete {
                    name: "a".into(),
                    file: repo("a-1.0-1-any.pkg.tar.zst"),
                },
            ]
        );
    }

    #[test]
    fn test_add_file_already_in_repo_and_by_name() {
        let runtime = runtime_with(&["/srv/repo/b-1.0-1-any.pkg.tar.zst"]);
        let policy = Policy::default();
        let planner = Planner::new(&runtime, Path::new(REPO), Path::new(DB), &policy);

        let scan = scan_of(&[
            "b-1.0-1-any.pkg.tar.zst",
            "c-1.0-1-any.pkg.tar.zst",
            "c-1.2-1-any.pkg.tar.zst",
        ]);
        let operation = Operation::Add(add_targets(&[
            "/srv/repo/b-1.0-1-any.pkg.tar.zst",
            "c",
        ]));
        let plan = planner.plan(&operation, &scan, &index_of(&[])).unwrap();

        assert_eq!(
            plan.mutations,
            vec![
                Mutation::IndexAdd {
                    name: "b".into(),
                    file: repo("b-1.0-1-any.pkg.tar.zst"),
                },
                Mutation::IndexAdd {
                    name: "c".into(),
                    file: repo("c-1.2-1-any.pkg.tar.zst"),
                },
                Mutation::Delete {
                    name: "c".into(),
                    file: repo("c-1.0-1-any.pkg.tar.zst"),
                },
            ]
        );
    }

    #[test]
    fn test_add_failures_are_collected() {
        let runtime = runtime_with(&[]);
        let policy = Policy::default();
        let planner = Planner::new(&runtime, Path::new(REPO), Path::new(DB), &policy);

        let operation = Operation::Add(add_targets(&[
            "ghost",
            "/tmp/nothere-1.0-1-any.pkg.tar.zst",
            "/tmp/garbage.pkg.tar.zst",
        ]));
        let plan = planner
            .plan(&operation, &ScanResult::default(), &index_of(&[]))
            .unwrap();

        assert!(plan.mutations.is_empty());
        assert_eq!(plan.failures.len(), 3);
        assert!(matches!(
            &plan.failures[0],
            Error::MutationFailed { name, .. } if name == "ghost"
        ));
        assert!(matches!(
            &plan.failures[1],
            Error::MutationFailed { name, .. } if name == "nothere"
        ));
    }

    #[test]
    fn test_remove() {
        let runtime = runtime_with(&[]);
        let policy = Policy::default();
        let planner = Planner::new(&runtime, Path::new(REPO), Path::new(DB), &policy);

        let scan = scan_of(&["a-1.0-1-any.pkg.tar.zst", "a-1.1-1-any.pkg.tar.zst"]);
        let index = index_of(&[("a", "1.1-1"), ("b", "1.0-1")]);
        let operation = Operation::Remove(vec!["a".into(), "b".into(), "ghost".into()]);
        let plan = planner.plan(&operation, &scan, &index).unwrap();

        assert_eq!(
            plan.mutations,
            vec![
                Mutation::IndexRemove { name: "a".into() },
                Mutation::Delete {
                    name: "a".into(),
                    file: repo("a-1.0-1-any.pkg.tar.zst"),
                },
                Mutation::Delete {
                    name: "a".into(),
                    file: repo("a-1.1-1-any.pkg.tar.zst"),
                },
                Mutation::IndexRemove { name: "b".into() },
            ]
        );
        assert_eq!(plan.failures.len(), 1);
    }

    #[test]
    fn test_reset_clears_then_adds_everything() {
        let runtime = runtime_with(&[DB]);
        let policy = Policy::default();
        let planner = Planner::new(&runtime, Path::new(REPO), Path::new(DB), &policy);

        let scan = scan_of(&["a-1.0-1-any.pkg.tar.zst"]);
        let plan = planner
            .plan(&Operation::Reset, &scan, &index_of(&[("a", "1.0-1")]))
            .unwrap();

        assert_eq!(
            plan.mutations,
            vec![
                Mutation::ClearIndex {
                    path: PathBuf::from(DB),
                },
                Mutation::IndexAdd {
                    name: "a".into(),
                    file: repo("a-1.0-1-any.pkg.tar.zst"),
                },
            ]
        );
        assert_eq!(plan.mutations[0].subject(), "repo.db.tar.gz");
    }

    #[test]
    fn test_add_target_parse() {
        assert_eq!(AddTarget::parse("foo"), AddTarget::Name("foo".into()));
        assert_eq!(
            AddTarget::parse("foo-1.0-1-any.pkg.tar.zst"),
            AddTarget::File(PathBuf::from("foo-1.0-1-any.pkg.tar.zst"))
        );
        assert_eq!(
            AddTarget::parse("./foo"),
            AddTarget::File(PathBuf::from("./foo"))
        );
    }

    #[test]
    fn test_mutation_text() {
        let m = Mutation::Delete {
            name: "a".into(),
            file: repo("a-1.0-1-any.pkg.tar.zst"),
        };
        assert_eq!(m.to_string(), "deleting /srv/repo/a-1.0-1-any.pkg.tar.zst");
        assert_eq!(m.prompt(), "Delete /srv/repo/a-1.0-1-any.pkg.tar.zst?");
        assert!(!m.is_index());

        let m = Mutation::IndexAdd {
            name: "a".into(),
            file: repo("a-1.0-1-any.pkg.tar.zst"),
        };
        assert_eq!(m.to_string(), "adding a-1.0-1-any.pkg.tar.zst to the database");
        assert!(m.is_index());
        assert!(!m.is_destructive());
    }
}
