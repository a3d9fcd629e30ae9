//! Normalization of schema-valid payloads into artifacts.
//!
//! Runs only after [`crate::schema::SchemaRegistry::check`] has accepted a
//! payload. Backend-supplied ordinals are never trusted: question positions
//! are always re-derived from array order, and task days are sequenced by
//! the configured [`DayPolicy`]. Text is trimmed and blank list entries are
//! dropped, so the artifact is internally consistent whatever the backend
//! emitted.

use std::fmt;
use std::str::FromStr;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::artifact::{
    IntakeForm, Milestone, ProjectOutline, Question, QuestionType, ScheduledTask, TaskSchedule,
};
use crate::schema::{FieldPath, Violation};

/// How task `day` values are sequenced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPolicy {
    /// Keep a supplied day when it does not go backwards; a missing or
    /// regressing day becomes the previous day plus one.
    #[default]
    NonDecreasing,
    /// Renumber days `1..=n` in array order, one task per day.
    Sequential,
}

impl fmt::Display for DayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NonDecreasing => "non_decreasing",
            Self::Sequential => "sequential",
        };
        f.write_str(s)
    }
}

impl FromStr for DayPolicy {
    type Err = DayPolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "non_decreasing" => Ok(Self::NonDecreasing),
            "sequential" => Ok(Self::Sequential),
            other => Err(DayPolicyParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`DayPolicy`] string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid day policy: {0:?} (expected non_decreasing or sequential)")]
pub struct DayPolicyParseError(pub String);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireForm {
    questions: Vec<WireQuestion>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct WireQuestion {
    id: String,
    prompt: String,
    question_type: QuestionType,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default, rename = "position")]
    _position: Option<IgnoredAny>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireOutline {
    milestones: Vec<WireMilestone>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct WireMilestone {
    title: String,
    description: String,
    #[serde(default)]
    success_criteria: Option<Vec<String>>,
    #[serde(default)]
    estimated_duration_days: Option<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireSchedule {
    tasks: Vec<WireTask>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct WireTask {
    #[serde(default)]
    day: Option<f64>,
    title: String,
    objective: String,
    body: String,
    estimated_minutes: f64,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    optional_challenge: Option<String>,
    #[serde(default)]
    reflection_prompt: Option<String>,
}

/// Deserialize a checked payload into its wire type.
///
/// The schema check has already accepted the value, so failure here means
/// the schema and the wire type disagree; it is still reported as a
/// violation rather than a panic.
fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Vec<Violation>> {
    serde_json::from_value(value)
        .map_err(|e| vec![Violation::new(&FieldPath::root(), format!("cannot decode payload: {e}"))])
}

// ---------------------------------------------------------------------------
// Stage normalizers
// ---------------------------------------------------------------------------

pub(crate) fn intake_form(value: Value) -> Result<IntakeForm, Vec<Violation>> {
    let wire: WireForm = decode(value)?;
    let questions = wire
        .questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| {
            let options = if q.question_type.has_options() {
                clean_list(q.options.unwrap_or_default())
            } else {
                Vec::new()
            };
            if q.question_type.has_options() && options.is_empty() {
                warn!(
                    question = q.id.trim(),
                    question_type = %q.question_type,
                    "select question has no options"
                );
            }
            Question {
                id: q.id.trim().to_string(),
                prompt: q.prompt.trim().to_string(),
                question_type: q.question_type,
                options,
                position: ordinal(i),
            }
        })
        .collect();
    Ok(IntakeForm { questions })
}

pub(crate) fn project_outline(value: Value) -> Result<ProjectOutline, Vec<Violation>> {
    let wire: WireOutline = decode(value)?;
    let milestones = wire
        .milestones
        .into_iter()
        .map(|m| Milestone {
            title: m.title.trim().to_string(),
            description: m.description.trim().to_string(),
            success_criteria: clean_list(m.success_criteria.unwrap_or_default()),
            estimated_duration_days: m.estimated_duration_days,
        })
        .collect();
    Ok(ProjectOutline { milestones })
}

pub(crate) fn task_schedule(value: Value, policy: DayPolicy) -> Result<TaskSchedule, Vec<Violation>> {
    let wire: WireSchedule = decode(value)?;
    let supplied: Vec<Option<u32>> = wire.tasks.iter().map(|t| t.day.map(day_from)).collect();
    let days = sequence_days(&supplied, policy);

    let tasks = wire
        .tasks
        .into_iter()
        .zip(days)
        .map(|(t, day)| ScheduledTask {
            day,
            title: t.title.trim().to_string(),
            objective: t.objective.trim().to_string(),
            body: t.body.trim().to_string(),
            estimated_minutes: t.estimated_minutes,
            description: clean_opt(t.description),
            optional_challenge: clean_opt(t.optional_challenge),
            reflection_prompt: clean_opt(t.reflection_prompt),
        })
        .collect();
    Ok(TaskSchedule { tasks })
}

/// Assign a day to every task according to `policy`.
pub fn sequence_days(supplied: &[Option<u32>], policy: DayPolicy) -> Vec<u32> {
    match policy {
        DayPolicy::Sequential => (1..).take(supplied.len()).collect(),
        DayPolicy::NonDecreasing => {
            let mut days = Vec::with_capacity(supplied.len());
            let mut previous = 0u32;
            for day in supplied {
                let next = match day {
                    Some(d) if *d >= previous.max(1) => *d,
                    _ => previous.saturating_add(1),
                };
                days.push(next);
                previous = next;
            }
            days
        }
    }
}

fn day_from(raw: f64) -> u32 {
    // Schema guarantees a whole number >= 1; clamp anything beyond u32.
    raw.clamp(1.0, f64::from(u32::MAX)) as u32
}

fn ordinal(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn clean_opt(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
