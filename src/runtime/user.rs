//! User interaction operations (confirmation prompts).

use anyhow::Result;

use super::RealRuntime;

use std::io::{self, BufRead, Write};

/// Ask `prompt` on `output` and read one answer line from `input`.
///
/// Only `y` / `yes` (any case) confirm. End of input counts as "no", so a
/// closed stdin never lets a destructive step through.
pub(crate) fn confirm_with_io<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    write!(output, "{} [y/N] ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        writeln!(output)?;
        return Ok(false);
    }

    let answer = line.trim().to_lowercase();
    Ok(matches!(answer.as_str(), "y" | "yes"))
}

impl RealRuntime {
    pub(crate) fn confirm_impl(&self, prompt: &str) -> Result<bool> {
        // The question goes to stderr so that stdout stays machine readable
        let stdin = io::stdin();
        let mut stderr = io::stderr();
        confirm_with_io(prompt, &mut stdin.lock(), &mut stderr)
    }
}
