use anyhow::Result;
use log::debug;
use std::collections::BTreeMap;

use crate::{
    repo::{Filter, PackageStatus},
    runtime::Runtime,
};

use super::{
    config::Config,
    output::Printer,
    state::{Queries, survey},
};

/// Print the names of packages matching every criterion.
///
/// Criteria are checked before anything is read, so a typo fails fast.
#[tracing::instrument(skip(runtime, config))]
pub async fn filter<R: Runtime>(
    runtime: &R,
    config: &Config,
    criteria: &[String],
    names: &[String],
) -> Result<()> {
    let filter = Filter::parse(criteria)?;
    let printer = Printer::from_config(runtime, config);
    let queries = Queries {
        installed: filter.needs_installed(),
        upstream: filter.needs_upstream(),
    };
    let statuses = survey(runtime, config, &printer, queries, names).await?;

    let matching = matching_names(&filter, &statuses);
    debug!("{} of {} package(s) match", matching.len(), statuses.len());
    printer.items(&matching);
    Ok(())
}

fn matching_names(filter: &Filter, statuses: &BTreeMap<String, PackageStatus>) -> Vec<String> {
    statuses
        .values()
        .filter(|status| filter.matches(status))
        .map(|status| status.name.clone())
        .collect()
}
