//! Generation stages.
//!
//! Each stage has exactly one context shape, one prompt, and one output
//! schema. The stages form a chain: the intake form collects answers, the
//! answers feed the project outline, and the outline feeds task schedules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A distinct generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Clarifying questions asked before planning.
    IntakeForm,
    /// Milestone outline derived from the answered intake form.
    ProjectOutline,
    /// Day-by-day tasks for one milestone (or the whole outline).
    TaskSchedule,
}

impl Stage {
    /// All stages in dependency order.
    pub const ALL: [Stage; 3] = [Stage::IntakeForm, Stage::ProjectOutline, Stage::TaskSchedule];

    /// The snake_case identifier used in prompts, config files, and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntakeForm => "intake_form",
            Self::ProjectOutline => "project_outline",
            Self::TaskSchedule => "task_schedule",
        }
    }

    /// The stage whose output must exist before this one can run, if any.
    ///
    /// The intake form has no artifact dependency: its answers reach the
    /// outline stage through the caller's project entity.
    pub fn depends_on(&self) -> Option<Stage> {
        match self {
            Self::IntakeForm | Self::ProjectOutline => None,
            Self::TaskSchedule => Some(Self::ProjectOutline),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intake_form" => Ok(Self::IntakeForm),
            // "chapter_outline" is the name older callers use for the same stage.
            "project_outline" | "chapter_outline" => Ok(Self::ProjectOutline),
            "task_schedule" => Ok(Self::TaskSchedule),
            other => Err(StageParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Stage`] string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stage: {0:?} (expected intake_form, project_outline, or task_schedule)")]
pub struct StageParseError(pub String);
