//! The generator: context, prompt, backend call, parse, in that order.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::record::{Execution, ExecutionRecord};
use super::request::GenerationRequest;
use super::retry::RetryPolicy;
use crate::artifact::{Artifact, IntakeForm, ProjectOutline, TaskSchedule};
use crate::backend::ChatBackend;
use crate::domain::{GoalProfile, MilestoneSummary, Project};
use crate::error::GenerationError;
use crate::invoker::{Correction, GenerationInvoker, InvokerSettings};
use crate::normalize::DayPolicy;
use crate::parse::ResponseParser;
use crate::prompt::PromptCatalog;
use crate::schema::SchemaRegistry;
use crate::stage::Stage;

/// Milestone counts outside this range are logged, never rejected.
pub const RECOMMENDED_MILESTONES: RangeInclusive<usize> = 3..=12;

/// Default number of milestone schedules generated at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Drives generation requests end to end.
///
/// A `Generator` holds only shared, immutable state (backend, prompt
/// catalog, schema registry, policies), so one instance can serve any
/// number of concurrent requests.
#[derive(Debug, Clone)]
pub struct Generator {
    invoker: GenerationInvoker,
    catalog: Arc<PromptCatalog>,
    parser: ResponseParser,
    retry: RetryPolicy,
}

// Compile-time assertion: Generator is shareable across tasks.
const _: () = {
    fn _assert_send_sync<T: Send + Sync>() {}
    fn _check() {
        _assert_send_sync::<Generator>();
    }
};

/// An outline with one schedule per milestone, in milestone order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPlan {
    pub outline: ProjectOutline,
    pub schedules: Vec<TaskSchedule>,
}

impl ProjectPlan {
    pub fn total_tasks(&self) -> usize {
        self.schedules.iter().map(|s| s.tasks.len()).sum()
    }
}

impl Generator {
    /// A generator with the built-in prompts, the standard schemas, and
    /// the default policies.
    pub fn new(backend: Arc<dyn ChatBackend>, settings: InvokerSettings) -> Self {
        Self {
            invoker: GenerationInvoker::new(backend, settings),
            catalog: Arc::new(PromptCatalog::builtin()),
            parser: ResponseParser::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<PromptCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_registry(mut self, registry: Arc<SchemaRegistry>) -> Self {
        let day_policy = self.parser.day_policy();
        self.parser = ResponseParser::new(registry).with_day_policy(day_policy);
        self
    }

    pub fn with_day_policy(mut self, day_policy: DayPolicy) -> Self {
        self.parser = self.parser.with_day_policy(day_policy);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn catalog(&self) -> &PromptCatalog {
        &self.catalog
    }

    pub fn parser(&self) -> &ResponseParser {
        &self.parser
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    // -----------------------------------------------------------------------
    // Stage-neutral entry points
    // -----------------------------------------------------------------------

    /// Generate the artifact for `request`, failing with the first error.
    pub async fn execute(&self, request: &GenerationRequest) -> Result<Artifact, GenerationError> {
        Ok(self.execute_recorded(request, None).await?.artifact)
    }

    /// Generate the artifact for `request` and return its execution record.
    pub async fn execute_recorded(
        &self,
        request: &GenerationRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<Execution, GenerationError> {
        let stage = request.stage();
        self.run(request, cancel, move |parser: &ResponseParser, raw: &str| {
            parser.parse(raw, stage)
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Typed entry points
    // -----------------------------------------------------------------------

    pub async fn intake_form(&self, profile: &GoalProfile) -> Result<IntakeForm, GenerationError> {
        let request = GenerationRequest::intake_form(profile)?;
        let execution = self
            .run(&request, None, ResponseParser::parse_intake_form)
            .await?;
        Ok(execution.artifact)
    }

    pub async fn project_outline(&self, project: &Project) -> Result<ProjectOutline, GenerationError> {
        let request = GenerationRequest::project_outline(project)?;
        let execution = self
            .run(&request, None, ResponseParser::parse_project_outline)
            .await?;
        Ok(execution.artifact)
    }

    pub async fn task_schedule(
        &self,
        project: &Project,
        outline: &ProjectOutline,
        milestone: Option<&MilestoneSummary>,
    ) -> Result<TaskSchedule, GenerationError> {
        let request = GenerationRequest::task_schedule(project, outline, milestone)?;
        let execution = self
            .run(&request, None, ResponseParser::parse_task_schedule)
            .await?;
        Ok(execution.artifact)
    }

    /// Generate an outline for `project`, then one schedule per milestone.
    ///
    /// Schedules run at most `concurrency` at a time and come back in
    /// milestone order. The first failure fails the whole plan.
    pub async fn plan_project(
        &self,
        project: &Project,
        concurrency: usize,
    ) -> Result<ProjectPlan, GenerationError> {
        let outline = self.project_outline(project).await?;
        let milestones: Vec<MilestoneSummary> = (0..outline.milestones.len())
            .filter_map(|i| MilestoneSummary::from_outline(&outline, i))
            .collect();
        info!(
            milestones = milestones.len(),
            concurrency = concurrency.max(1),
            "scheduling milestones"
        );

        let outline_ref = &outline;
        let schedules: Vec<TaskSchedule> = stream::iter(milestones)
            .map(|milestone| async move {
                self.task_schedule(project, outline_ref, Some(&milestone)).await
            })
            .buffered(concurrency.max(1))
            .try_collect()
            .await?;

        Ok(ProjectPlan { outline, schedules })
    }

    // -----------------------------------------------------------------------
    // Attempt loop
    // -----------------------------------------------------------------------

    async fn run<A, F>(
        &self,
        request: &GenerationRequest,
        cancel: Option<&CancellationToken>,
        parse: F,
    ) -> Result<Execution<A>, GenerationError>
    where
        A: ItemCount,
        F: Fn(&ResponseParser, &str) -> Result<A, GenerationError>,
    {
        let stage = request.stage();
        let prompt = self.catalog.get(stage);
        let schema = self.parser.registry().json_schema(stage);
        let started_at = Utc::now();

        let mut correction: Option<Correction> = None;
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            // The corrective re-prompt does not consume the retry budget.
            let budget_used = attempts - u32::from(correction.is_some());
            debug!(%stage, attempt = attempts, "generation attempt");

            let chat = self.invoker.build_request(
                prompt,
                request.context(),
                &schema,
                correction.as_ref(),
            )?;
            let raw = match self.invoker.send(&chat, stage, cancel).await {
                Ok(raw) => raw,
                Err(err) if err.is_retryable() && self.retry.allows_retry_after(budget_used) => {
                    let delay = self.retry.delay_after(budget_used);
                    warn!(
                        %stage,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after failed attempt"
                    );
                    pause(delay, stage, cancel).await?;
                    continue;
                }
                Err(err) => return Err(err),
            };

            match parse(&self.parser, &raw) {
                Ok(artifact) => {
                    warn_on_count(stage, artifact.item_count());
                    let record = ExecutionRecord {
                        id: Uuid::new_v4(),
                        stage,
                        backend: self.invoker.backend_name().to_string(),
                        model: self.invoker.settings().model.clone(),
                        prompt_version: prompt.version().to_string(),
                        prompt_digest: prompt.digest().to_string(),
                        context: request.context().payload().clone(),
                        raw_output: raw,
                        attempts,
                        started_at,
                        finished_at: Utc::now(),
                    };
                    info!(
                        %stage,
                        attempts,
                        items = artifact.item_count(),
                        elapsed_ms = record.elapsed_ms(),
                        "generation completed"
                    );
                    return Ok(Execution { artifact, record });
                }
                Err(err)
                    if err.is_contract_failure()
                        && self.retry.correct_once
                        && correction.is_none() =>
                {
                    warn!(%stage, attempt = attempts, error = %err, "re-prompting with correction");
                    correction = Some(Correction::from_error(&raw, &err));
                }
                Err(err) => {
                    warn!(%stage, attempt = attempts, error = %err, "backend output rejected");
                    return Err(err);
                }
            }
        }
    }
}

/// Sleep for `delay` unless the token fires first.
async fn pause(
    delay: Duration,
    stage: Stage,
    cancel: Option<&CancellationToken>,
) -> Result<(), GenerationError> {
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(GenerationError::Cancelled { stage }),
            _ = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

fn warn_on_count(stage: Stage, count: usize) {
    if count == 0 {
        warn!(%stage, "backend returned an empty list");
    } else if stage == Stage::ProjectOutline && !RECOMMENDED_MILESTONES.contains(&count) {
        warn!(
            %stage,
            milestones = count,
            "milestone count outside the recommended 3-12"
        );
    }
}

/// Number of top-level items in a parsed artifact.
pub(crate) trait ItemCount {
    fn item_count(&self) -> usize;
}

impl ItemCount for Artifact {
    fn item_count(&self) -> usize {
        Artifact::item_count(self)
    }
}

impl ItemCount for IntakeForm {
    fn item_count(&self) -> usize {
        self.questions.len()
    }
}

impl ItemCount for ProjectOutline {
    fn item_count(&self) -> usize {
        self.milestones.len()
    }
}

impl ItemCount for TaskSchedule {
    fn item_count(&self) -> usize {
        self.tasks.len()
    }
}
