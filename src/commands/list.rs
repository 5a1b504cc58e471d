use anyhow::Result;
use log::debug;

use crate::{
    query::Upstream,
    repo::{PackageStatus, Tag},
    runtime::Runtime,
};

use super::{
    config::Config,
    output::Printer,
    state::{Queries, survey},
};

/// Annotations `list` adds after each package name.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub versioned: bool,
    pub pending: bool,
    pub duplicates: bool,
    pub installed: bool,
    pub outdated: bool,
}

impl ListOptions {
    pub fn all() -> Self {
        Self {
            versioned: true,
            pending: true,
            duplicates: true,
            installed: true,
            outdated: true,
        }
    }
}

/// List the packages of the repository.
///
/// Without `names` every package with a file or a database entry is listed.
#[tracing::instrument(skip(runtime, config))]
pub async fn list<R: Runtime>(
    runtime: &R,
    config: &Config,
    options: ListOptions,
    names: &[String],
) -> Result<()> {
    let printer = Printer::from_config(runtime, config);
    let queries = Queries {
        installed: options.installed || !names.is_empty(),
        upstream: options.outdated,
    };
    let statuses = survey(runtime, config, &printer, queries, names).await?;

    let entries: Vec<String> = statuses
        .values()
        .filter(|status| !names.is_empty() || status.disk.is_some() || status.index.is_some())
        .map(|status| format_entry(status, options))
        .collect();
    debug!("Listing {} package(s)", entries.len());

    printer.items(&entries);
    Ok(())
}

pub(crate) fn format_entry(status: &PackageStatus, options: ListOptions) -> String {
    let mut entry = status.name.clone();

    if options.versioned {
        if let Some(version) = status.version() {
            entry.push(' ');
            entry.push_str(&version);
        }
    }

    if options.outdated {
        match &status.upstream {
            Upstream::Found(latest) if status.has(Tag::Outdated) => {
                entry.push_str(" -> ");
                entry.push_str(latest);
            }
            Upstream::NotFound if status.has(Tag::Missing) => entry.push_str(" [not upstream]"),
            _ => {}
        }
    }

    if options.installed {
        match &status.installed {
            Some(version) if options.versioned => {
                entry.push_str(&format!(" [installed {}]", version));
            }
            Some(_) => entry.push_str(" [installed]"),
            None => {}
        }
    }

    if options.duplicates && status.has(Tag::Duplicate) {
        let count = status.disk.as_ref().map_or(0, |group| group.obsolete().len());
        let plural = if count == 1 { "" } else { "s" };
        entry.push_str(&format!(" [{} duplicate{}]", count, plural));
    }

    if options.pending {
        if status.has(Tag::PendingAdd) {
            entry.push_str(" [pending add]");
        }
        if status.has(Tag::PendingRemove) {
            entry.push_str(" [pending remove]");
        }
    }

    entry
}
