//! Sequential execution of a [`Plan`].

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::Error;
use crate::index::{IndexWriter, database_files};
use crate::runtime::Runtime;

use super::plan::{ImportMode, Mutation, Plan};

/// What happened to one package.
#[derive(Debug)]
pub enum Outcome {
    /// Every mutation was applied
    Done,
    /// At least one mutation was declined or skipped, none failed
    Skipped,
    Failed(Vec<Error>),
}

/// Per-package results of executing a plan, in name order.
#[derive(Debug, Default)]
pub struct Report {
    outcomes: BTreeMap<String, Outcome>,
}

impl Report {
    pub fn outcomes(&self) -> &BTreeMap<String, Outcome> {
        &self.outcomes
    }

    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.outcomes.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes
            .values()
            .any(|outcome| matches!(outcome, Outcome::Failed(_)))
    }

    /// Every failure, in name order.
    pub fn failures(&self) -> impl Iterator<Item = &Error> {
        self.outcomes.values().flat_map(|outcome| match outcome {
            Outcome::Failed(errors) => errors.as_slice(),
            _ => &[] as &[Error],
        })
    }

    fn done(&mut self, name: &str) {
        self.outcomes.entry(name.to_string()).or_insert(Outcome::Done);
    }

    fn skipped(&mut self, name: &str) {
        let outcome = self
            .outcomes
            .entry(name.to_string())
            .or_insert(Outcome::Skipped);
        if matches!(outcome, Outcome::Done) {
            *outcome = Outcome::Skipped;
        }
    }

    fn failed(&mut self, error: Error) {
        let name = match &error {
            Error::MutationFailed { name, .. } => name.clone(),
            other => other.to_string(),
        };
        match self.outcomes.get_mut(&name) {
            Some(Outcome::Failed(errors)) => errors.push(error),
            Some(outcome) => *outcome = Outcome::Failed(vec![error]),
            None => {
                self.outcomes.insert(name, Outcome::Failed(vec![error]));
            }
        }
    }
}

/// Applies mutations one at a time.
pub struct Executor<'a, R: Runtime, W: IndexWriter> {
    runtime: &'a R,
    writer: &'a W,
    interactive: bool,
    progress: Option<Box<dyn Fn(&Mutation) + 'a>>,
}

impl<'a, R: Runtime, W: IndexWriter> Executor<'a, R, W> {
    pub fn new(runtime: &'a R, writer: &'a W, interactive: bool) -> Self {
        Self {
            runtime,
            writer,
            interactive,
            progress: None,
        }
    }

    /// Called before each mutation is applied.
    pub fn with_progress(mut self, progress: impl Fn(&Mutation) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Run `plan` to the end. A failure, or a declined database change, skips
    /// the remaining mutations of the same package; other packages go on.
    #[tracing::instrument(skip_all, fields(mutations = plan.mutations.len()))]
    pub fn execute(&self, plan: Plan) -> Report {
        let mut report = Report::default();
        for failure in plan.failures {
            report.failed(failure);
        }

        let mut blocked = BTreeSet::new();
        for mutation in &plan.mutations {
            let subject = mutation.subject();
            if blocked.contains(&subject) {
                debug!("Skipping {}: earlier step of {} did not happen", mutation, subject);
                report.skipped(&subject);
                continue;
            }

            if self.interactive && mutation.is_destructive() {
                match self.runtime.confirm(&mutation.prompt()) {
                    Ok(true) => {}
                    Ok(false) => {
                        info!("Declined: {}", mutation);
                        report.skipped(&subject);
                        if mutation.is_index() {
                            blocked.insert(subject);
                        }
                        continue;
                    }
                    Err(e) => {
                        report.failed(failure(&subject, e));
                        blocked.insert(subject);
                        continue;
                    }
                }
            }

            if let Some(progress) = &self.progress {
                progress(mutation);
            }
            match self.apply(mutation) {
                Ok(()) => report.done(&subject),
                Err(e) => {
                    warn!("Failed {}: {:#}", mutation, e);
                    report.failed(failure(&subject, e));
                    blocked.insert(subject);
                }
            }
        }
        report
    }

    fn apply(&self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::Import { from, to, mode, .. } => {
                if let Some(dir) = to.parent() {
                    self.runtime.create_dir_all(dir)?;
                }
                match mode {
                    ImportMode::Copy => self.runtime.copy(from, to).map(|_| ()),
                    ImportMode::Move => self.relocate(from, to),
                }
            }
            Mutation::IndexAdd { file, .. } => self.writer.add_entry(file),
            Mutation::IndexRemove { name } => self.writer.remove_entry(name),
            Mutation::Delete { file, .. } => self.runtime.remove_file(file),
            Mutation::Backup { file, to, .. } => {
                if let Some(dir) = to.parent() {
                    self.runtime
                        .create_dir_all(dir)
                        .context("Failed to create backup directory")?;
                }
                self.relocate(file, to)
            }
            Mutation::ClearIndex { path } => {
                for file in database_files(path) {
                    if self.runtime.exists(&file) || self.runtime.is_symlink(&file) {
                        self.runtime.remove_file(&file)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Move a file, copying when a rename is not possible (another device).
    fn relocate(&self, from: &Path, to: &Path) -> Result<()> {
        if let Err(e) = self.runtime.rename(from, to) {
            debug!("Rename failed ({:#}), copying instead", e);
            self.runtime.copy(from, to)?;
            self.runtime.remove_file(from)?;
        }
        Ok(())
    }
}

fn failure(name: &str, e: anyhow::Error) -> Error {
    Error::MutationFailed {
        name: name.to_string(),
        cause: format!("{:#}", e),
    }
}
