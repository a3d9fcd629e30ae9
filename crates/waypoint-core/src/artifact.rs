//! Normalized stage outputs.
//!
//! Artifacts are produced only by the parser in [`crate::parse`], after the
//! backend payload has passed schema validation and normalization. Field
//! names serialize in camelCase, which is the interchange format consumed by
//! the persistence layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::stage::Stage;

// ---------------------------------------------------------------------------
// Intake form
// ---------------------------------------------------------------------------

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    FreeText,
    SingleSelect,
    MultiSelect,
}

impl QuestionType {
    /// Every accepted wire value, in declaration order.
    pub const VARIANTS: [&'static str; 3] = ["free_text", "single_select", "multi_select"];

    /// Whether answers are chosen from a fixed option list.
    pub fn has_options(&self) -> bool {
        !matches!(self, Self::FreeText)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FreeText => "free_text",
            Self::SingleSelect => "single_select",
            Self::MultiSelect => "multi_select",
        };
        f.write_str(s)
    }
}

impl FromStr for QuestionType {
    type Err = QuestionTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free_text" => Ok(Self::FreeText),
            "single_select" => Ok(Self::SingleSelect),
            "multi_select" => Ok(Self::MultiSelect),
            other => Err(QuestionTypeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`QuestionType`] string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid question type: {0:?}")]
pub struct QuestionTypeParseError(pub String);

/// One intake question.
///
/// `free_text` questions always carry an empty `options` list, and
/// `position` is the zero-based display index within the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub position: u32,
}

/// The `intake_form` artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeForm {
    pub questions: Vec<Question>,
}

// ---------------------------------------------------------------------------
// Project outline
// ---------------------------------------------------------------------------

/// One milestone of a project outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_days: Option<f64>,
}

/// The `project_outline` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectOutline {
    pub milestones: Vec<Milestone>,
}

// ---------------------------------------------------------------------------
// Task schedule
// ---------------------------------------------------------------------------

/// One day-scoped task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    /// One-based day within the schedule.
    pub day: u32,
    pub title: String,
    pub objective: String,
    pub body: String,
    pub estimated_minutes: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection_prompt: Option<String>,
}

/// The `task_schedule` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSchedule {
    pub tasks: Vec<ScheduledTask>,
}

impl TaskSchedule {
    /// Number of distinct days covered by the schedule.
    pub fn day_span(&self) -> u32 {
        match (self.tasks.first(), self.tasks.last()) {
            (Some(first), Some(last)) => last.day.saturating_sub(first.day) + 1,
            _ => 0,
        }
    }

    /// Sum of the estimated minutes of every task.
    pub fn total_minutes(&self) -> f64 {
        self.tasks.iter().map(|t| t.estimated_minutes).sum()
    }
}

// ---------------------------------------------------------------------------
// Any stage
// ---------------------------------------------------------------------------

/// The normalized output of any stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Artifact {
    IntakeForm(IntakeForm),
    ProjectOutline(ProjectOutline),
    TaskSchedule(TaskSchedule),
}

impl Artifact {
    /// The stage that produced this artifact.
    pub fn stage(&self) -> Stage {
        match self {
            Self::IntakeForm(_) => Stage::IntakeForm,
            Self::ProjectOutline(_) => Stage::ProjectOutline,
            Self::TaskSchedule(_) => Stage::TaskSchedule,
        }
    }

    /// Number of top-level items (questions, milestones, or tasks).
    pub fn item_count(&self) -> usize {
        match self {
            Self::IntakeForm(f) => f.questions.len(),
            Self::ProjectOutline(o) => o.milestones.len(),
            Self::TaskSchedule(s) => s.tasks.len(),
        }
    }

    pub fn into_intake_form(self) -> Option<IntakeForm> {
        match self {
            Self::IntakeForm(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_project_outline(self) -> Option<ProjectOutline> {
        match self {
            Self::ProjectOutline(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_task_schedule(self) -> Option<TaskSchedule> {
        match self {
            Self::TaskSchedule(s) => Some(s),
            _ => None,
        }
    }
}

impl From<IntakeForm> for Artifact {
    fn from(f: IntakeForm) -> Self {
        Self::IntakeForm(f)
    }
}

impl From<ProjectOutline> for Artifact {
    fn from(o: ProjectOutline) -> Self {
        Self::ProjectOutline(o)
    }
}

impl From<TaskSchedule> for Artifact {
    fn from(s: TaskSchedule) -> Self {
        Self::TaskSchedule(s)
    }
}
