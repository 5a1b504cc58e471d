//! External command execution.

use anyhow::{Context, Result};
use log::debug;
use std::ffi::OsString;
use std::process::Command;

use super::RealRuntime;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn run_impl(&self, program: &str, args: &[OsString]) -> Result<ProcessOutput> {
        debug!("Running {} {:?}", program, args);
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("Failed to execute {}", program))?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};

    #[test]
    fn test_run_captures_output_and_status() {
        let runtime = RealRuntime;
        let output = runtime
            .run("sh", &["-c".into(), "echo out; echo err >&2; exit 3".into()])
            .unwrap();

        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn test_run_missing_program_is_an_error() {
        let runtime = RealRuntime;
        let err = runtime
            .run("repoctl-no-such-program", &[])
            .unwrap_err();
        assert!(err.to_string().contains("repoctl-no-such-program"));
    }
}
