//! Stage prompt catalog.
//!
//! The built-in catalog is defined in `prompts.toml` and embedded in the
//! binary at compile time. Alternate catalogs load from any TOML file with
//! the same layout, so prompt wording can change without touching code.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::stage::Stage;

/// The embedded prompt catalog TOML.
static PROMPTS_TOML: &str = include_str!("prompts.toml");

/// Errors from loading a prompt catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read prompt catalog {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid prompt catalog: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to serialize prompt catalog: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("prompt catalog has no entry for stage {0}")]
    MissingStage(Stage),

    #[error("prompt catalog defines stage {0} more than once")]
    DuplicateStage(Stage),

    #[error("prompt for stage {0} has blank text")]
    BlankText(Stage),
}

/// One stage prompt with its revision identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptEntry {
    stage: Stage,
    version: String,
    text: String,
    digest: String,
}

impl PromptEntry {
    /// Build an entry; surrounding whitespace in `text` is dropped before
    /// the digest is computed.
    pub fn new(stage: Stage, version: impl Into<String>, text: impl AsRef<str>) -> Self {
        let text = text.as_ref().trim().to_string();
        let digest = hex::encode(Sha256::digest(text.as_bytes()));
        Self {
            stage,
            version: version.into(),
            text,
            digest,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Hex-encoded SHA-256 of the prompt text.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// TOML layout of a catalog file.
#[derive(Debug, Deserialize, Serialize)]
struct CatalogFile {
    prompts: Vec<CatalogFileEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CatalogFileEntry {
    stage: Stage,
    version: String,
    text: String,
}

/// Immutable mapping from every [`Stage`] to its prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptCatalog {
    entries: BTreeMap<Stage, PromptEntry>,
}

impl PromptCatalog {
    /// The catalog compiled into the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed or incomplete. The unit
    /// tests load it, so a shipped binary always has a valid catalog.
    pub fn builtin() -> Self {
        Self::from_toml_str(PROMPTS_TOML).expect("embedded prompts.toml is invalid")
    }

    /// Build a catalog from explicit entries. Every stage must appear
    /// exactly once with non-blank text.
    pub fn from_entries(
        entries: impl IntoIterator<Item = PromptEntry>,
    ) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for entry in entries {
            if entry.text.is_empty() {
                return Err(CatalogError::BlankText(entry.stage));
            }
            let stage = entry.stage;
            if map.insert(stage, entry).is_some() {
                return Err(CatalogError::DuplicateStage(stage));
            }
        }
        if let Some(missing) = Stage::ALL.iter().find(|s| !map.contains_key(*s)) {
            return Err(CatalogError::MissingStage(*missing));
        }
        Ok(Self { entries: map })
    }

    /// Parse a catalog from TOML text. Unknown stage names are rejected by
    /// the TOML decoder.
    pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(text)?;
        Self::from_entries(
            file.prompts
                .into_iter()
                .map(|e| PromptEntry::new(e.stage, e.version, e.text)),
        )
    }

    /// Load a catalog from a TOML file on disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render the catalog in the file layout `load` accepts.
    pub fn to_toml_string(&self) -> Result<String, CatalogError> {
        let file = CatalogFile {
            prompts: self
                .entries
                .values()
                .map(|e| CatalogFileEntry {
                    stage: e.stage,
                    version: e.version.clone(),
                    text: e.text.clone(),
                })
                .collect(),
        };
        Ok(toml::to_string_pretty(&file)?)
    }

    /// The prompt for `stage`. Construction guarantees every stage exists.
    pub fn get(&self, stage: Stage) -> &PromptEntry {
        &self.entries[&stage]
    }

    /// Entries in stage order.
    pub fn entries(&self) -> impl Iterator<Item = &PromptEntry> {
        self.entries.values()
    }
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<PromptEntry> {
        Stage::ALL
            .iter()
            .map(|s| PromptEntry::new(*s, "t1", format!("prompt for {s}")))
            .collect()
    }

    #[test]
    fn builtin_catalog_covers_every_stage() {
        let catalog = PromptCatalog::builtin();
        for stage in Stage::ALL {
            let entry = catalog.get(stage);
            assert_eq!(entry.stage(), stage);
            assert!(!entry.text().is_empty());
            assert!(!entry.version().is_empty());
            assert_eq!(entry.digest().len(), 64);
        }
    }

    #[test]
    fn builtin_prompts_name_their_context_headings() {
        let catalog = PromptCatalog::builtin();
        assert!(catalog.get(Stage::IntakeForm).text().contains("USER_CONTEXT"));
        assert!(catalog.get(Stage::ProjectOutline).text().contains("5-12 milestones"));
        assert!(catalog.get(Stage::TaskSchedule).text().contains("5-14 days"));
    }

    #[test]
    fn digest_tracks_text() {
        let a = PromptEntry::new(Stage::IntakeForm, "1", "hello");
        let b = PromptEntry::new(Stage::IntakeForm, "2", "  hello\n");
        let c = PromptEntry::new(Stage::IntakeForm, "1", "hello!");
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(
            a.digest(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn missing_stage_is_rejected() {
        let mut list = entries();
        list.retain(|e| e.stage() != Stage::TaskSchedule);
        let err = PromptCatalog::from_entries(list).unwrap_err();
        assert!(matches!(err, CatalogError::MissingStage(Stage::TaskSchedule)));
    }

    #[test]
    fn duplicate_stage_is_rejected() {
        let mut list = entries();
        list.push(PromptEntry::new(Stage::IntakeForm, "t2", "again"));
        let err = PromptCatalog::from_entries(list).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateStage(Stage::IntakeForm)));
    }

    #[test]
    fn blank_text_is_rejected() {
        let mut list = entries();
        list[1] = PromptEntry::new(Stage::ProjectOutline, "t1", "   \n ");
        let err = PromptCatalog::from_entries(list).unwrap_err();
        assert!(matches!(err, CatalogError::BlankText(Stage::ProjectOutline)));
    }

    #[test]
    fn unknown_stage_fails_to_parse() {
        let text = r#"
            [[prompts]]
            stage = "retrospective"
            version = "1"
            text = "x"
        "#;
        let err = PromptCatalog::from_toml_str(text).unwrap_err();
        assert!(matches!(err, CatalogError::Toml(_)));
    }

    #[test]
    fn export_reloads_to_same_catalog() {
        let catalog = PromptCatalog::builtin();
        let text = catalog.to_toml_string().unwrap();
        assert_eq!(PromptCatalog::from_toml_str(&text).unwrap(), catalog);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let err = PromptCatalog::load(&path).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
        assert!(err.to_string().contains("nope.toml"));
    }
}
