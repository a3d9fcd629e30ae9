//! Context builders: project domain entities into prompt payloads.
//!
//! Each builder is a pure function of its inputs. The resulting
//! [`StageContext`] holds only JSON primitives, arrays, and objects (object
//! keys are sorted), so the same inputs always serialize to the same text
//! and nothing about the storage layer or the backend leaks into a prompt.

use serde::Serialize;
use serde_json::Value;

use crate::artifact::{ProjectOutline, Question};
use crate::domain::{Familiarity, GoalProfile, MilestoneSummary, Project};
use crate::error::GenerationError;
use crate::stage::Stage;

/// An immutable, stage-scoped prompt payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageContext {
    stage: Stage,
    payload: Value,
}

impl StageContext {
    fn encode<T: Serialize>(stage: Stage, payload: &T) -> Result<Self, GenerationError> {
        let payload = serde_json::to_value(payload)
            .map_err(|source| GenerationError::ContextEncoding { stage, source })?;
        Ok(Self { stage, payload })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Heading under which the payload appears in the user message.
    pub fn label(&self) -> &'static str {
        match self.stage {
            Stage::IntakeForm => "USER_CONTEXT",
            Stage::ProjectOutline => "PROJECT_CONTEXT",
            Stage::TaskSchedule => "SCHEDULE_CONTEXT",
        }
    }

    /// Pretty-printed JSON for the prompt.
    pub fn to_json_pretty(&self) -> Result<String, GenerationError> {
        serde_json::to_string_pretty(&self.payload).map_err(|source| {
            GenerationError::ContextEncoding {
                stage: self.stage,
                source,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct IntakePayload<'a> {
    goal: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_per_week: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    effort_level: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    familiarity_choice: Option<Familiarity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    work_style: Option<&'a str>,
}

#[derive(Serialize)]
struct ProjectPayload {
    project: ProjectBody,
}

#[derive(Serialize)]
struct ProjectBody {
    title: String,
    responses: Vec<ResponseLine>,
}

#[derive(Serialize)]
struct ResponseLine {
    question: String,
    answers: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SchedulePayload<'a> {
    project_context: ProjectPayload,
    project_outline: &'a ProjectOutline,
    #[serde(skip_serializing_if = "Option::is_none")]
    milestone: Option<&'a MilestoneSummary>,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Context for `intake_form`: the goal plus whatever planning preferences
/// the user already gave. Absent preferences are omitted, not nulled.
pub fn intake_form(profile: &GoalProfile) -> Result<StageContext, GenerationError> {
    let payload = IntakePayload {
        goal: profile.goal.trim(),
        time_per_week: profile.time_per_week,
        effort_level: non_blank(profile.effort_level.as_deref()),
        familiarity_choice: profile.familiarity,
        work_style: non_blank(profile.work_style.as_deref()),
    };
    StageContext::encode(Stage::IntakeForm, &payload)
}

/// Context for `project_outline`: the project title and each answered
/// question, with option lists folded into the question line.
pub fn project_outline(project: &Project) -> Result<StageContext, GenerationError> {
    StageContext::encode(Stage::ProjectOutline, &project_payload(project))
}

/// Context for `task_schedule`: the project context, the generated outline,
/// and (when scheduling a single milestone) that milestone.
pub fn task_schedule(
    project: &Project,
    outline: &ProjectOutline,
    milestone: Option<&MilestoneSummary>,
) -> Result<StageContext, GenerationError> {
    let payload = SchedulePayload {
        project_context: project_payload(project),
        project_outline: outline,
        milestone,
    };
    StageContext::encode(Stage::TaskSchedule, &payload)
}

fn project_payload(project: &Project) -> ProjectPayload {
    let responses = project
        .responses
        .iter()
        .map(|entry| ResponseLine {
            question: question_line(&entry.question),
            answers: entry
                .answer
                .values
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
        })
        .collect();
    ProjectPayload {
        project: ProjectBody {
            title: project.title.trim().to_string(),
            responses,
        },
    }
}

/// Fold a question's option list into one line: `"<prompt> Options: a, b"`.
///
/// Free-text questions, and questions without options, render as the bare
/// prompt.
pub fn question_line(question: &Question) -> String {
    let prompt = question.prompt.trim();
    if question.question_type.has_options() && !question.options.is_empty() {
        format!("{prompt} Options: {}", question.options.join(", "))
    } else {
        prompt.to_string()
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
