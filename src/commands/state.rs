use anyhow::Result;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::Error,
    index::{IndexEntry, IndexReader},
    package::scan,
    query::{self, LocalQuery, Registry, Upstream},
    repo::{ClassifyInput, PackageStatus, classify},
    runtime::Runtime,
};

use super::{
    config::Config,
    output::Printer,
    services::{build_local, build_reader, build_registry},
};

/// How to treat a database file that does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MissingIndex {
    Empty,
    Fatal,
}

/// Read every database entry. A corrupt database is always an error.
pub(crate) fn read_index<I: IndexReader>(
    reader: &I,
    missing: MissingIndex,
) -> Result<BTreeMap<String, IndexEntry>> {
    match reader.list_entries() {
        Ok(entries) => Ok(entries),
        Err(e)
            if missing == MissingIndex::Empty
                && e.downcast_ref::<Error>().is_some_and(Error::is_missing_index) =>
        {
            info!("{:#}; starting from an empty database", e);
            Ok(BTreeMap::new())
        }
        Err(e) => Err(e),
    }
}

/// Collaborators to ask in addition to the directory and the database.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Queries {
    pub installed: bool,
    pub upstream: bool,
}

/// Scan the repository, read its database, run the queries and classify.
///
/// With `names`, only those packages are queried and returned; a name
/// nothing knows about is warned about.
#[tracing::instrument(skip(runtime, config, printer))]
pub(crate) async fn survey<R: Runtime>(
    runtime: &R,
    config: &Config,
    printer: &Printer,
    queries: Queries,
    names: &[String],
) -> Result<BTreeMap<String, PackageStatus>> {
    let scanned = scan(runtime, &config.repo_dir)?;
    printer.malformed(&scanned.malformed);
    let index = read_index(&build_reader(runtime, config), MissingIndex::Empty)?;

    let requested: BTreeSet<String> = names.iter().cloned().collect();
    let candidates: Vec<String> = if requested.is_empty() {
        scanned
            .groups
            .keys()
            .chain(index.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    } else {
        requested.iter().cloned().collect()
    };
    debug!("{} candidate package(s), {:?}", candidates.len(), queries);

    let registry = if queries.upstream {
        Some(build_registry(config)?)
    } else {
        None
    };
    let local = queries.installed.then(|| build_local(runtime, config));
    let results = query::collect(
        &candidates,
        registry.as_ref().map(|r| r as &dyn Registry),
        local.as_ref().map(|l| l as &dyn LocalQuery),
        config.query,
    )
    .await;

    for (name, upstream) in &results.upstream {
        if let Upstream::Unavailable(reason) = upstream {
            printer.warn(format!("{}: {}", name, reason));
        }
    }

    let mut statuses = classify(ClassifyInput {
        disk: scanned.groups,
        index,
        installed: results.installed,
        upstream: results.upstream,
    });

    if !requested.is_empty() {
        statuses.retain(|name, _| requested.contains(name));
        for name in requested.iter().filter(|name| !statuses.contains_key(*name)) {
            printer.warn(format!("{}: no such package", name));
        }
    }
    Ok(statuses)
}
