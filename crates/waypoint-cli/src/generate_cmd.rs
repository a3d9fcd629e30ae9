//! `waypoint generate` and `waypoint plan`: run stages against the backend.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::info;

use waypoint_core::{
    GenerationRequest, Generator, GoalProfile, MilestoneSummary, Project, ProjectOutline,
};

use crate::config::WaypointConfig;
use crate::io::{read_json, write_json};
use crate::{GenerateCommands, OutputArgs};

/// Execute a `waypoint generate` subcommand.
pub async fn run_generate_command(command: GenerateCommands, config: &WaypointConfig) -> Result<()> {
    let generator = config.generator()?;
    let (request, output) = match command {
        GenerateCommands::Intake { profile, output } => {
            let profile: GoalProfile = read_json(&profile, "goal profile")?;
            (GenerationRequest::intake_form(&profile)?, output)
        }
        GenerateCommands::Outline { project, output } => {
            let project: Project = read_json(&project, "project")?;
            (GenerationRequest::project_outline(&project)?, output)
        }
        GenerateCommands::Schedule {
            project,
            outline,
            milestone,
            output,
        } => {
            let project: Project = read_json(&project, "project")?;
            let outline: ProjectOutline = read_json(&outline, "project outline")?;
            let milestone: Option<MilestoneSummary> = milestone
                .as_deref()
                .map(|path| read_json(path, "milestone"))
                .transpose()?;
            (
                GenerationRequest::task_schedule(&project, &outline, milestone.as_ref())?,
                output,
            )
        }
    };
    run_request(&generator, &request, &output).await
}

async fn run_request(
    generator: &Generator,
    request: &GenerationRequest,
    output: &OutputArgs,
) -> Result<()> {
    let token = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(token.clone());
    let result = request.execute_recorded(generator, Some(&token)).await;
    watcher.abort();

    let execution = result.with_context(|| format!("{} generation failed", request.stage()))?;
    write_json(&execution.artifact, output.output.as_deref())?;
    if output.record {
        let record = serde_json::to_string_pretty(&execution.record)
            .context("failed to serialize execution record")?;
        eprintln!("{record}");
    }
    Ok(())
}

fn cancel_on_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    })
}

/// Execute `waypoint plan`: outline plus one schedule per milestone.
pub async fn run_plan(
    config: &WaypointConfig,
    project: &Path,
    concurrency: usize,
    output: Option<&Path>,
) -> Result<()> {
    let generator = config.generator()?;
    let project: Project = read_json(project, "project")?;

    let plan = tokio::select! {
        result = generator.plan_project(&project, concurrency) => {
            result.context("project planning failed")?
        }
        _ = tokio::signal::ctrl_c() => bail!("planning interrupted"),
    };
    info!(
        milestones = plan.outline.milestones.len(),
        tasks = plan.total_tasks(),
        "plan complete"
    );
    write_json(&plan, output)
}
