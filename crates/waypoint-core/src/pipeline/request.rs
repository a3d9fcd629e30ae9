//! Stage requests: a context bound to the stage it was built for.

use tokio_util::sync::CancellationToken;

use super::generator::Generator;
use super::record::Execution;
use crate::artifact::{Artifact, ProjectOutline};
use crate::context::{self, StageContext};
use crate::domain::{GoalProfile, MilestoneSummary, Project};
use crate::error::GenerationError;
use crate::stage::Stage;

/// One unit of generation work.
///
/// Requests are built per stage. A schedule request can only be built from
/// an existing [`ProjectOutline`], so stage ordering is enforced by the
/// constructor signatures.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    context: StageContext,
}

impl GenerationRequest {
    pub fn intake_form(profile: &GoalProfile) -> Result<Self, GenerationError> {
        Ok(Self {
            context: context::intake_form(profile)?,
        })
    }

    pub fn project_outline(project: &Project) -> Result<Self, GenerationError> {
        Ok(Self {
            context: context::project_outline(project)?,
        })
    }

    /// Schedule `milestone` of `outline`, or the whole outline when
    /// `milestone` is `None`.
    pub fn task_schedule(
        project: &Project,
        outline: &ProjectOutline,
        milestone: Option<&MilestoneSummary>,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            context: context::task_schedule(project, outline, milestone)?,
        })
    }

    pub fn stage(&self) -> Stage {
        self.context.stage()
    }

    pub fn context(&self) -> &StageContext {
        &self.context
    }

    /// Run the request to completion on `generator`.
    pub async fn execute(&self, generator: &Generator) -> Result<Artifact, GenerationError> {
        generator.execute(self).await
    }

    /// Run the request and keep its execution record.
    pub async fn execute_recorded(
        &self,
        generator: &Generator,
        cancel: Option<&CancellationToken>,
    ) -> Result<Execution, GenerationError> {
        generator.execute_recorded(self, cancel).await
    }
}
