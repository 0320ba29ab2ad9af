//! User interaction operations (numbered selection prompts).

use anyhow::{Result, anyhow, bail};

use super::RealRuntime;

use std::io::{self, BufRead, Write};

/// Core, testable implementation that reads from any BufRead and writes to any Write.
pub(crate) fn select_with_io<R: BufRead, W: Write>(
    prompt: &str,
    choices: &[String],
    input: &mut R,
    output: &mut W,
) -> Result<usize> {
    if choices.is_empty() {
        bail!("Nothing to select for: {}", prompt);
    }

    writeln!(output, "{}", prompt)?;
    for (index, choice) in choices.iter().enumerate() {
        writeln!(output, "  {}) {}", index + 1, choice)?;
    }
    write!(output, "Select [1-{}] (default 1): ", choices.len())?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("No selection made: input closed");
    }

    let answer = line.trim();
    if answer.is_empty() {
        return Ok(0);
    }

    answer
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=choices.len()).contains(n))
        .map(|n| n - 1)
        .ok_or_else(|| anyhow!("'{}' is not one of 1-{}", answer, choices.len()))
}

impl RealRuntime {
    pub(crate) fn select_impl(&self, prompt: &str, choices: &[String]) -> Result<usize> {
        // Prompts go to stderr so generated output on stdout stays clean.
        let stdin = io::stdin();
        let mut stderr = io::stderr();
        let mut stdin_lock = stdin.lock();
        select_with_io(prompt, choices, &mut stdin_lock, &mut stderr)
    }
}
