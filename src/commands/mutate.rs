use anyhow::{Result, bail};
use log::{debug, info};
use std::collections::BTreeMap;

use crate::{
    package::scan,
    repo::{Executor, ImportMode, Operation, Outcome, Planner, Report, add_targets},
    runtime::Runtime,
};

use super::{
    config::Config,
    output::Printer,
    services::{build_reader, build_writer},
    state::{MissingIndex, read_index},
};

/// Bring the database in line with the package files.
#[tracing::instrument(skip(runtime, config))]
pub fn update<R: Runtime>(runtime: &R, config: &Config) -> Result<()> {
    run(runtime, config, Operation::Update, ImportMode::Copy)
}

/// Rebuild the database from scratch out of the package files.
#[tracing::instrument(skip(runtime, config))]
pub fn reset<R: Runtime>(runtime: &R, config: &Config) -> Result<()> {
    run(runtime, config, Operation::Reset, ImportMode::Copy)
}

/// Add package files, or the newest file of a package already present.
#[tracing::instrument(skip(runtime, config))]
pub fn add<R: Runtime>(
    runtime: &R,
    config: &Config,
    targets: &[String],
    mode: ImportMode,
) -> Result<()> {
    run(runtime, config, Operation::Add(add_targets(targets)), mode)
}

/// Remove packages from the database and discard their files.
#[tracing::instrument(skip(runtime, config))]
pub fn remove<R: Runtime>(runtime: &R, config: &Config, names: &[String]) -> Result<()> {
    run(runtime, config, Operation::Remove(names.to_vec()), ImportMode::Copy)
}

fn run<R: Runtime>(
    runtime: &R,
    config: &Config,
    operation: Operation,
    mode: ImportMode,
) -> Result<()> {
    let printer = Printer::from_config(runtime, config);
    let scanned = scan(runtime, &config.repo_dir)?;
    printer.malformed(&scanned.malformed);

    let index = match operation {
        // reset never looks at the old database, so it also repairs a corrupt one
        Operation::Reset => BTreeMap::new(),
        Operation::Remove(_) => read_index(&build_reader(runtime, config), MissingIndex::Fatal)?,
        _ => read_index(&build_reader(runtime, config), MissingIndex::Empty)?,
    };

    let policy = config.policy(mode);
    let planner = Planner::new(runtime, &config.repo_dir, &config.database, &policy);
    let plan = planner.plan(&operation, &scanned, &index)?;
    if plan.is_empty() {
        printer.info("Nothing to do.");
        return Ok(());
    }
    debug!("Executing {} mutation(s)", plan.mutations.len());

    let writer = build_writer(runtime, config);
    let report = Executor::new(runtime, &writer, policy.interactive)
        .with_progress(|mutation| printer.progress(mutation))
        .execute(plan);
    summarize(&printer, &report)
}

/// Print what was skipped and every failure; fail when anything failed.
fn summarize(printer: &Printer, report: &Report) -> Result<()> {
    for (name, outcome) in report.outcomes() {
        if let Outcome::Skipped = outcome {
            printer.info(format!("{}: skipped", name));
        }
    }

    let failures: Vec<_> = report.failures().collect();
    for failure in &failures {
        printer.error(failure);
    }
    if !failures.is_empty() {
        let failed = report
            .outcomes()
            .values()
            .filter(|outcome| matches!(outcome, Outcome::Failed(_)))
            .count();
        bail!("{} package(s) could not be processed", failed);
    }

    info!("{} package(s) processed", report.outcomes().len());
    Ok(())
}
