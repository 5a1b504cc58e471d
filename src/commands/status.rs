use anyhow::Result;
use std::collections::BTreeMap;

use crate::{
    query::Upstream,
    repo::{PackageStatus, Tag, Tags},
    runtime::Runtime,
};

use super::{
    config::Config,
    output::Printer,
    state::{Queries, survey},
};

/// Show every package that needs attention, with its tags.
#[tracing::instrument(skip(runtime, config))]
pub async fn status<R: Runtime>(runtime: &R, config: &Config, names: &[String]) -> Result<()> {
    let printer = Printer::from_config(runtime, config);
    let queries = Queries {
        installed: true,
        upstream: true,
    };
    let statuses = survey(runtime, config, &printer, queries, names).await?;

    printer.result(format!(
        "On repo {} ({})",
        config.repo_name(),
        config.database.display()
    ));
    printer.items(&report_lines(&statuses));
    Ok(())
}

fn report_lines(statuses: &BTreeMap<String, PackageStatus>) -> Vec<String> {
    let lines: Vec<String> = statuses.values().filter_map(status_line).collect();
    if lines.is_empty() {
        return vec!["Everything up-to-date.".to_string()];
    }
    lines
}

/// `None` for a package that is fully in sync.
fn status_line(status: &PackageStatus) -> Option<String> {
    let tags: Tags = status.tags.iter().filter(|tag| *tag != Tag::InSync).collect();
    if tags.is_empty() {
        return None;
    }

    let mut line = format!("  {}", status.name);
    if let Some(version) = status.version() {
        line.push(' ');
        line.push_str(&version);
    }
    line.push_str(": ");
    line.push_str(&tags.to_string());

    if let Upstream::Found(latest) = &status.upstream {
        if tags.contains(Tag::Outdated) {
            line.push_str(&format!(" (upstream {})", latest));
        }
    }
    Some(line)
}
