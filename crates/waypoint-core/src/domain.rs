//! Domain entities supplied by the caller.
//!
//! These are the inputs the context builders project into prompt payloads.
//! They deserialize from the JSON the persistence layer already produces,
//! so the CLI can read them straight from files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::artifact::{ProjectOutline, Question};

// ---------------------------------------------------------------------------
// Intake stage input
// ---------------------------------------------------------------------------

/// Self-reported familiarity with the goal's domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Familiarity {
    Beginner,
    Intermediate,
    Expert,
}

impl fmt::Display for Familiarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Expert => "expert",
        };
        f.write_str(s)
    }
}

impl FromStr for Familiarity {
    type Err = FamiliarityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "expert" => Ok(Self::Expert),
            other => Err(FamiliarityParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Familiarity`] string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid familiarity: {0:?} (expected beginner, intermediate, or expert)")]
pub struct FamiliarityParseError(pub String);

/// What the user told us before any questions were generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProfile {
    /// The goal in the user's own words. May be vague.
    pub goal: String,
    /// Hours per week the user can commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_per_week: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub familiarity: Option<Familiarity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_style: Option<String>,
}

impl GoalProfile {
    /// A profile with only the goal set.
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            time_per_week: None,
            effort_level: None,
            familiarity: None,
            work_style: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outline stage input
// ---------------------------------------------------------------------------

/// A stored answer. Persisted answers are either one string or a list of
/// strings; both normalize to a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AnswerRepr", into = "AnswerRepr")]
pub struct Answer {
    pub values: Vec<String>,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum AnswerRepr {
    One(String),
    Many(Vec<String>),
}

impl From<AnswerRepr> for Answer {
    fn from(repr: AnswerRepr) -> Self {
        match repr {
            AnswerRepr::One(v) => Self { values: vec![v] },
            AnswerRepr::Many(values) => Self { values },
        }
    }
}

impl From<Answer> for AnswerRepr {
    fn from(answer: Answer) -> Self {
        AnswerRepr::Many(answer.values)
    }
}

impl Answer {
    pub fn single(value: impl Into<String>) -> Self {
        Self {
            values: vec![value.into()],
        }
    }

    pub fn many<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// A question from a previously generated intake form together with the
/// user's answer to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub question: Question,
    pub answer: Answer,
}

/// A user's project: the goal title and every answered intake question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub title: String,
    #[serde(default)]
    pub responses: Vec<QuestionResponse>,
}

// ---------------------------------------------------------------------------
// Schedule stage input
// ---------------------------------------------------------------------------

/// The persisted milestone whose tasks are being generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneSummary {
    pub title: String,
    pub summary: String,
    /// Zero-based position of the milestone within its outline.
    pub position: u32,
}

impl MilestoneSummary {
    /// Summarize the milestone at `index` of a generated outline.
    pub fn from_outline(outline: &ProjectOutline, index: usize) -> Option<Self> {
        let milestone = outline.milestones.get(index)?;
        Some(Self {
            title: milestone.title.clone(),
            summary: milestone.description.clone(),
            position: u32::try_from(index).ok()?,
        })
    }
}
