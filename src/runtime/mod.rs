//! Runtime abstraction for system operations.
//!
//! Every filesystem access, external process and user prompt made by the
//! engine goes through [`Runtime`], so the reconciliation logic can be driven
//! by `MockRuntime` in tests and by [`RealRuntime`] in the binary.
//!
//! # Structure
//!
//! - `env` - Environment variables and well-known directories
//! - `fs` - File system operations (read, copy, move, delete, directory)
//! - `link` - Symlink inspection (one-level resolution)
//! - `path` - Lexical path helpers
//! - `process` - External command execution
//! - `user` - User interaction (confirmation prompts)

mod env;
mod fs;
mod link;
pub mod path;
mod process;
mod user;

use anyhow::Result;
use std::env as std_env;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};

pub use path::{normalize_path, same_directory};
pub use process::ProcessOutput;

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;
    fn current_dir(&self) -> Result<PathBuf>;

    // File System
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;

    /// True for regular files, following symlinks.
    fn is_file(&self, path: &Path) -> bool;
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    // Symlinks
    fn is_symlink(&self, path: &Path) -> bool;

    /// Resolve a symlink to an absolute path without following nested links.
    /// A relative target is resolved against the link's parent directory.
    fn resolve_link(&self, path: &Path) -> Result<PathBuf>;

    // Processes
    /// Run a program to completion, capturing its output.
    fn run(&self, program: &str, args: &[OsString]) -> Result<ProcessOutput>;

    // Directories
    fn config_dir(&self) -> Option<PathBuf>;

    // User interaction
    /// Prompt user for confirmation. Returns true if user confirms (y/yes), false otherwise.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        self.open_impl(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename_impl(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        self.copy_impl(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.is_file_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        self.is_symlink_impl(path)
    }

    fn resolve_link(&self, path: &Path) -> Result<PathBuf> {
        self.resolve_link_impl(path)
    }

    fn run(&self, program: &str, args: &[OsString]) -> Result<ProcessOutput> {
        self.run_impl(program, args)
    }

    fn config_dir(&self) -> Option<PathBuf> {
        self.config_dir_impl()
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.confirm_impl(prompt)
    }
}
