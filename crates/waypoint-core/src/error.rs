//! Errors surfaced by the generation pipeline.
//!
//! Every failure path produces a [`GenerationError`] the caller can branch
//! on. Empty responses, timeouts, and transient backend failures are
//! retryable; malformed JSON and schema violations carry full diagnostics
//! (raw-text excerpt plus violation paths) because blind retries rarely fix
//! a systematic prompt/schema mismatch.

use std::time::Duration;

use crate::backend::BackendError;
use crate::schema::{Violation, format_violations};
use crate::stage::Stage;

/// Maximum number of characters of raw backend output kept in errors.
pub const EXCERPT_CHARS: usize = 500;

/// Errors that can occur while generating one artifact.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("backend returned an empty {stage} response")]
    EmptyResponse { stage: Stage },

    #[error("backend did not answer the {stage} request within {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("{stage} request was cancelled")]
    Cancelled { stage: Stage },

    #[error("{stage} request failed: {source}")]
    Backend {
        stage: Stage,
        #[source]
        source: BackendError,
    },

    #[error("unable to parse {stage} response as JSON: {source}")]
    MalformedJson {
        stage: Stage,
        #[source]
        source: serde_json::Error,
        excerpt: String,
    },

    #[error("{stage} payload failed validation: {}", format_violations(.violations))]
    SchemaViolation {
        stage: Stage,
        violations: Vec<Violation>,
        excerpt: String,
    },

    #[error("failed to encode {stage} context: {source}")]
    ContextEncoding {
        stage: Stage,
        #[source]
        source: serde_json::Error,
    },
}

impl GenerationError {
    /// Whether a fresh call to the backend may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmptyResponse { .. } | Self::Timeout { .. } => true,
            Self::Backend { source, .. } => source.is_transient(),
            Self::Cancelled { .. }
            | Self::MalformedJson { .. }
            | Self::SchemaViolation { .. }
            | Self::ContextEncoding { .. } => false,
        }
    }

    /// Whether the backend answered with content that broke the contract.
    pub fn is_contract_failure(&self) -> bool {
        matches!(self, Self::MalformedJson { .. } | Self::SchemaViolation { .. })
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::EmptyResponse { stage }
            | Self::Timeout { stage, .. }
            | Self::Cancelled { stage }
            | Self::Backend { stage, .. }
            | Self::MalformedJson { stage, .. }
            | Self::SchemaViolation { stage, .. }
            | Self::ContextEncoding { stage, .. } => *stage,
        }
    }

    /// Violations for a schema failure, empty for every other kind.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::SchemaViolation { violations, .. } => violations.as_slice(),
            _ => &[],
        }
    }

    /// The raw-output excerpt for contract failures.
    pub fn excerpt(&self) -> Option<&str> {
        match self {
            Self::MalformedJson { excerpt, .. } | Self::SchemaViolation { excerpt, .. } => {
                Some(excerpt.as_str())
            }
            _ => None,
        }
    }
}

/// Truncate `raw` to [`EXCERPT_CHARS`] characters, marking the cut.
pub fn excerpt(raw: &str) -> String {
    truncate_chars(raw, EXCERPT_CHARS)
}

pub(crate) fn truncate_chars(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={char_count}]"));
    preview
}
