//! Response parsing: raw backend text into a validated, normalized artifact.
//!
//! Three steps, each with its own failure:
//!
//! 1. strict JSON decode (`MalformedJson`)
//! 2. schema check against the stage contract (`SchemaViolation`)
//! 3. normalization (trimming, defaults, positions, day sequencing)
//!
//! Parsing is pure; the same text always yields the same artifact.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::artifact::{Artifact, IntakeForm, ProjectOutline, TaskSchedule};
use crate::error::{GenerationError, excerpt};
use crate::normalize::{self, DayPolicy};
use crate::schema::{SchemaRegistry, Violation};
use crate::stage::Stage;

/// Validates and normalizes backend output for every stage.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    registry: Arc<SchemaRegistry>,
    day_policy: DayPolicy,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(Arc::new(SchemaRegistry::standard()))
    }
}

impl ResponseParser {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            day_policy: DayPolicy::default(),
        }
    }

    pub fn with_day_policy(mut self, day_policy: DayPolicy) -> Self {
        self.day_policy = day_policy;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn day_policy(&self) -> DayPolicy {
        self.day_policy
    }

    /// Parse `raw` as the output of `stage`.
    pub fn parse(&self, raw: &str, stage: Stage) -> Result<Artifact, GenerationError> {
        Ok(match stage {
            Stage::IntakeForm => self.parse_intake_form(raw)?.into(),
            Stage::ProjectOutline => self.parse_project_outline(raw)?.into(),
            Stage::TaskSchedule => self.parse_task_schedule(raw)?.into(),
        })
    }

    pub fn parse_intake_form(&self, raw: &str) -> Result<IntakeForm, GenerationError> {
        let value = self.checked_value(raw, Stage::IntakeForm)?;
        normalize::intake_form(value).map_err(|v| violation(Stage::IntakeForm, v, raw))
    }

    pub fn parse_project_outline(&self, raw: &str) -> Result<ProjectOutline, GenerationError> {
        let value = self.checked_value(raw, Stage::ProjectOutline)?;
        normalize::project_outline(value).map_err(|v| violation(Stage::ProjectOutline, v, raw))
    }

    pub fn parse_task_schedule(&self, raw: &str) -> Result<TaskSchedule, GenerationError> {
        let value = self.checked_value(raw, Stage::TaskSchedule)?;
        normalize::task_schedule(value, self.day_policy)
            .map_err(|v| violation(Stage::TaskSchedule, v, raw))
    }

    /// Decode `raw` and check it against the stage contract.
    fn checked_value(&self, raw: &str, stage: Stage) -> Result<Value, GenerationError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|source| GenerationError::MalformedJson {
                stage,
                source,
                excerpt: excerpt(raw),
            })?;

        let violations = self.registry.check(stage, &value);
        if !violations.is_empty() {
            debug!(%stage, count = violations.len(), "payload failed schema check");
            return Err(violation(stage, violations, raw));
        }
        Ok(value)
    }
}

fn violation(stage: Stage, violations: Vec<Violation>, raw: &str) -> GenerationError {
    GenerationError::SchemaViolation {
        stage,
        violations,
        excerpt: excerpt(raw),
    }
}

/// Parse with the standard registry and default day policy.
pub fn parse(raw: &str, stage: Stage) -> Result<Artifact, GenerationError> {
    ResponseParser::default().parse(raw, stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::QuestionType;

    #[test]
    fn free_text_question_is_normalized() {
        let raw = r#"{"questions":[{"id":"q1","prompt":"Goal?","questionType":"free_text","options":["x"],"position":5}]}"#;
        let form = parse(raw, Stage::IntakeForm).unwrap().into_intake_form().unwrap();
        assert_eq!(form.questions.len(), 1);
        let q = &form.questions[0];
        assert_eq!(q.id, "q1");
        assert_eq!(q.question_type, QuestionType::FreeText);
        assert!(q.options.is_empty());
        assert_eq!(q.position, 0);
    }

    #[test]
    fn broken_json_is_malformed() {
        let err = parse("{not json", Stage::ProjectOutline).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedJson { .. }));
        assert_eq!(err.excerpt(), Some("{not json"));
    }

    #[test]
    fn missing_title_names_the_path() {
        let raw = r#"{"milestones":[{"title":"Start","description":"a"},{"description":"b"}]}"#;
        let err = parse(raw, Stage::ProjectOutline).unwrap_err();
        let paths: Vec<&str> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["milestones[1].title"]);
    }

    #[test]
    fn select_question_with_empty_options_parses() {
        let raw = r#"{"questions":[{"id":"q1","prompt":"Pick","questionType":"single_select","options":[],"position":0}]}"#;
        let form = parse(raw, Stage::IntakeForm).unwrap().into_intake_form().unwrap();
        let q = &form.questions[0];
        assert_eq!(q.question_type, QuestionType::SingleSelect);
        assert!(q.options.is_empty());
        assert_eq!(q.position, 0);
    }

    #[test]
    fn every_violation_is_reported() {
        let raw = r#"{"questions":[
            {"id":"a","prompt":"A?","questionType":"free_text"},
            {"id":"a","prompt":"B?","questionType":"free_text"},
            {"id":"c","prompt":"","questionType":"free_text"}
        ]}"#;
        let err = parse(raw, Stage::IntakeForm).unwrap_err();
        let paths: Vec<&str> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["questions[2].prompt", "questions[1].id"]);
    }

    #[test]
    fn wrong_top_level_type_is_a_violation() {
        let err = parse("[]", Stage::TaskSchedule).unwrap_err();
        assert!(matches!(err, GenerationError::SchemaViolation { .. }));
    }

    #[test]
    fn sequential_policy_renumbers_days() {
        let raw = r#"{"tasks":[
            {"day":4,"title":"a","objective":"o","body":"b","estimatedMinutes":30},
            {"day":4,"title":"b","objective":"o","body":"b","estimatedMinutes":30}
        ]}"#;
        let parser = ResponseParser::default().with_day_policy(DayPolicy::Sequential);
        let schedule = parser.parse_task_schedule(raw).unwrap();
        let days: Vec<u32> = schedule.tasks.iter().map(|t| t.day).collect();
        assert_eq!(days, vec![1, 2]);

        let schedule = ResponseParser::default().parse_task_schedule(raw).unwrap();
        let days: Vec<u32> = schedule.tasks.iter().map(|t| t.day).collect();
        assert_eq!(days, vec![4, 4]);
    }

    #[test]
    fn parse_is_idempotent_over_its_own_output() {
        let raw = r#"{"milestones":[{"title":"  Plan ","description":"Sketch it.","successCriteria":["", "done"]}]}"#;
        let first = parse(raw, Stage::ProjectOutline).unwrap();
        let again = serde_json::to_string(&first).unwrap();
        let second = parse(&again, Stage::ProjectOutline).unwrap();
        assert_eq!(first, second);
    }
}
