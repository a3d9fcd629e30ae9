//! JSON input and output for the command handlers.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Read and decode a JSON file describing `what` (used in error messages).
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {what} file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid {what} JSON document", path.display()))
}

/// Pretty-print `value` to `output`, or to stdout when `output` is `None`.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{text}\n"))
                .with_context(|| format!("cannot write output file: {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{text}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::GoalProfile;

    #[test]
    fn reads_camel_case_profile() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("profile.json");
        std::fs::write(&path, r#"{"goal":"Learn to sail","timePerWeek":4}"#).unwrap();
        let profile: GoalProfile = read_json(&path, "profile").unwrap();
        assert_eq!(profile.goal, "Learn to sail");
        assert_eq!(profile.time_per_week, Some(4.0));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_json::<GoalProfile>(Path::new("/no/such/profile.json"), "profile").unwrap_err();
        assert!(err.to_string().contains("/no/such/profile.json"));
    }

    #[test]
    fn writes_pretty_json_to_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out.json");
        write_json(&serde_json::json!({"a": 1}), Some(&path)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"a\": 1\n}\n");
    }
}
