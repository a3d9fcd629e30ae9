//! Execution records: the audit trail of one generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::artifact::Artifact;
use crate::stage::Stage;

/// What was sent, to whom, and what came back.
///
/// The pipeline never stores records; callers persist them if they keep a
/// prompt-execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub stage: Stage,
    pub backend: String,
    pub model: String,
    pub prompt_version: String,
    /// Hex SHA-256 of the prompt text.
    pub prompt_digest: String,
    pub context: Value,
    /// The raw text of the accepted reply.
    pub raw_output: String,
    /// Backend calls made, including any corrective re-prompt.
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// A generated artifact together with its record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Execution<A = Artifact> {
    pub artifact: A,
    pub record: ExecutionRecord,
}

impl<A> Execution<A> {
    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> Execution<B> {
        Execution {
            artifact: f(self.artifact),
            record: self.record,
        }
    }
}
