//! `waypoint validate`: check a saved backend response offline.

use std::path::Path;

use anyhow::{Context, Result, bail};

use waypoint_core::{DayPolicy, ResponseParser, Stage};

use crate::io::write_json;

/// The day policy for offline validation: `--sequential-days` wins over
/// the configured policy.
pub fn effective_day_policy(sequential_days: bool, configured: DayPolicy) -> DayPolicy {
    if sequential_days {
        DayPolicy::Sequential
    } else {
        configured
    }
}

/// Parse `file` as the raw output of `stage` and print the normalized
/// artifact, or list every violation and fail.
pub fn run_validate(
    stage: Stage,
    file: &Path,
    day_policy: DayPolicy,
    output: Option<&Path>,
) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read response file: {}", file.display()))?;
    let parser = ResponseParser::default().with_day_policy(day_policy);

    match parser.parse(&raw, stage) {
        Ok(artifact) => write_json(&artifact, output),
        Err(err) if !err.violations().is_empty() => {
            let violations = err.violations();
            eprintln!("{} is not a valid {stage} response:", file.display());
            for violation in violations {
                eprintln!("  {violation}");
            }
            bail!("{} violation(s) found", violations.len());
        }
        Err(err) => Err(err)
            .with_context(|| format!("{} is not a valid {stage} response", file.display())),
    }
}
