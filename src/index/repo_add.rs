use anyhow::{Result, bail};
use log::debug;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

use super::IndexWriter;

pub const DEFAULT_ADD_COMMAND: &str = "repo-add";
pub const DEFAULT_REMOVE_COMMAND: &str = "repo-remove";

/// Writes the database by running pacman's `repo-add` / `repo-remove`.
pub struct RepoAddWriter<'a, R: Runtime> {
    runtime: &'a R,
    database: PathBuf,
    add_command: String,
    remove_command: String,
    add_params: Vec<String>,
    rm_params: Vec<String>,
}

impl<'a, R: Runtime> RepoAddWriter<'a, R> {
    pub fn new(runtime: &'a R, database: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            database: database.into(),
            add_command: DEFAULT_ADD_COMMAND.to_string(),
            remove_command: DEFAULT_REMOVE_COMMAND.to_string(),
            add_params: Vec::new(),
            rm_params: Vec::new(),
        }
    }

    pub fn with_commands(mut self, add: impl Into<String>, remove: impl Into<String>) -> Self {
        self.add_command = add.into();
        self.remove_command = remove.into();
        self
    }

    /// Extra arguments placed before the database path.
    pub fn with_params(mut self, add_params: Vec<String>, rm_params: Vec<String>) -> Self {
        self.add_params = add_params;
        self.rm_params = rm_params;
        self
    }

    fn invoke(&self, program: &str, params: &[String], target: OsString) -> Result<()> {
        let mut args: Vec<OsString> = params.iter().map(OsString::from).collect();
        args.push(self.database.clone().into_os_string());
        args.push(target);

        let output = self.runtime.run(program, &args)?;
        debug!("{} stdout: {}", program, output.stdout.trim());
        if !output.success() {
            let status = output
                .code
                .map_or_else(|| "a signal".to_string(), |code| format!("status {}", code));
            bail!(
                "{} exited with {}: {}",
                program,
                status,
                output.stderr.trim()
            );
        }
        Ok(())
    }
}

impl<R: Runtime> IndexWriter for RepoAddWriter<'_, R> {
    #[tracing::instrument(skip(self))]
    fn add_entry(&self, package_file: &Path) -> Result<()> {
        self.invoke(
            &self.add_command,
            &self.add_params,
            package_file.as_os_str().to_os_string(),
        )
    }

    #[tracing::instrument(skip(self))]
    fn remove_entry(&self, name: &str) -> Result<()> {
        self.invoke(&self.remove_command, &self.rm_params, OsString::from(name))
    }
}
