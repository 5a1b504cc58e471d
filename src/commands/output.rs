use std::fmt::Display;

use crate::{package::MalformedFile, repo::Mutation, runtime::Runtime};

use super::config::Config;

/// Terminal width assumed when `COLUMNS` is unset or invalid
const DEFAULT_WIDTH: usize = 80;
/// Spaces between two columns
const COLUMN_GAP: usize = 2;

/// Writes command output: results to stdout, warnings and errors to stderr.
///
/// `quiet` silences warnings and progress, never results or errors.
#[derive(Debug, Clone)]
pub struct Printer {
    quiet: bool,
    columns: bool,
    width: usize,
}

impl Printer {
    pub fn new(quiet: bool, columns: bool, width: usize) -> Self {
        Self {
            quiet,
            columns,
            width,
        }
    }

    pub fn from_config<R: Runtime>(runtime: &R, config: &Config) -> Self {
        let width = runtime
            .env_var("COLUMNS")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|width| *width > 0)
            .unwrap_or(DEFAULT_WIDTH);
        Self::new(config.quiet, config.columns, width)
    }

    pub fn warn(&self, message: impl Display) {
        if !self.quiet {
            eprintln!("warning: {}", message);
        }
    }

    pub fn error(&self, message: impl Display) {
        eprintln!("error: {}", message);
    }

    /// A result line; printed even when quiet.
    pub fn result(&self, message: impl Display) {
        println!("{}", message);
    }

    pub fn info(&self, message: impl Display) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    pub fn malformed(&self, files: &[MalformedFile]) {
        for file in files {
            self.warn(format!("skipping {}: {}", file.path.display(), file.error));
        }
    }

    pub fn progress(&self, mutation: &Mutation) {
        self.info(mutation);
    }

    /// Print one entry per line, or in columns when enabled.
    pub fn items(&self, items: &[String]) {
        for line in self.layout(items) {
            self.result(line);
        }
    }

    /// Lay `items` out column by column, the way `ls` does.
    pub fn layout(&self, items: &[String]) -> Vec<String> {
        if !self.columns || items.is_empty() {
            return items.to_vec();
        }

        let cell = items.iter().map(|item| item.chars().count()).max().unwrap_or(0) + COLUMN_GAP;
        let ncols = (self.width / cell).clamp(1, items.len());
        let nrows = items.len().div_ceil(ncols);

        (0..nrows)
            .map(|row| {
                let mut line = String::new();
                for col in 0..ncols {
                    if let Some(item) = items.get(col * nrows + row) {
                        line.push_str(&format!("{:<width$}", item, width = cell));
                    }
                }
                line.trim_end().to_string()
            })
            .collect()
    }
}
