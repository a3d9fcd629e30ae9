mod config;
mod generate_cmd;
mod io;
mod prompts_cmd;
mod validate_cmd;

use std::path::PathBuf;

use anyhow::bail;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use waypoint_core::backend::OpenAiConfig;
use waypoint_core::pipeline::DEFAULT_CONCURRENCY;
use waypoint_core::{DayPolicy, InvokerSettings, Stage};

use config::{CliOverrides, WaypointConfig};

#[derive(Parser)]
#[command(
    name = "waypoint",
    version,
    about = "Generate intake forms, milestone outlines, and task schedules from a goal"
)]
struct Cli {
    /// Chat-completions endpoint URL (overrides WAYPOINT_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Model name (overrides WAYPOINT_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Load stage prompts from this TOML file instead of the built-in catalog
    #[arg(long, global = true)]
    prompts: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            prompts: self.prompts.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a waypoint config file (uses --endpoint and --model)
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Generate one stage artifact
    Generate {
        #[command(subcommand)]
        command: GenerateCommands,
    },
    /// Generate an outline and a schedule for every milestone
    Plan {
        /// Path to the project JSON file
        #[arg(long)]
        project: PathBuf,
        /// Maximum number of schedules generated at once
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a saved backend response and print the normalized artifact
    Validate {
        /// Stage the response belongs to (intake_form, project_outline, task_schedule)
        stage: Stage,
        /// Path to the raw response text
        file: PathBuf,
        /// Renumber task days 1..=n (overrides the configured day policy)
        #[arg(long)]
        sequential_days: bool,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Inspect stage prompts and schemas
    Prompts {
        #[command(subcommand)]
        command: PromptCommands,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Where generated artifacts go.
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output file path (defaults to stdout)
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Print the execution record to stderr
    #[arg(long)]
    pub record: bool,
}

#[derive(Subcommand, Clone)]
pub enum GenerateCommands {
    /// Clarifying questions for a goal
    Intake {
        /// Path to the goal profile JSON file
        #[arg(long)]
        profile: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Milestone outline for an answered project
    Outline {
        /// Path to the project JSON file
        #[arg(long)]
        project: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Daily task schedule for a milestone (or the whole outline)
    Schedule {
        /// Path to the project JSON file
        #[arg(long)]
        project: PathBuf,
        /// Path to the project outline JSON file
        #[arg(long)]
        outline: PathBuf,
        /// Path to the milestone summary JSON file
        #[arg(long)]
        milestone: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Subcommand, Clone)]
pub enum PromptCommands {
    /// List every stage prompt with its version and digest
    List,
    /// Print the prompt for a stage
    Show {
        /// Stage name
        stage: Stage,
    },
    /// Print the output schema for a stage
    Schema {
        /// Stage name
        stage: Stage,
    },
    /// Write the active catalog as TOML, ready for editing
    Export {
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Execute the `waypoint init` command: write config file.
fn cmd_init(cli: &Cli, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let endpoint = cli
        .endpoint
        .clone()
        .unwrap_or_else(|| OpenAiConfig::DEFAULT_ENDPOINT.to_string());
    let model = cli
        .model
        .clone()
        .unwrap_or_else(|| InvokerSettings::DEFAULT_MODEL.to_string());

    let cfg = config::ConfigFile {
        backend: config::BackendSection {
            endpoint: Some(endpoint.clone()),
            model: Some(model.clone()),
            timeout_secs: Some(InvokerSettings::DEFAULT_TIMEOUT.as_secs()),
            temperature: None,
        },
        generation: config::GenerationSection {
            day_policy: Some(DayPolicy::default()),
            prompts: cli.prompts.clone(),
            retry: None,
        },
    };

    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  backend.endpoint = {endpoint}");
    println!("  backend.model = {model}");
    println!();
    println!("Set {} in your environment to authenticate.", config::ENV_API_KEY);

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Init { force } => {
            cmd_init(&cli, *force)?;
        }
        Commands::Generate { command } => {
            let resolved = WaypointConfig::resolve(&cli.overrides())?;
            generate_cmd::run_generate_command(command.clone(), &resolved).await?;
        }
        Commands::Plan {
            project,
            concurrency,
            output,
        } => {
            let resolved = WaypointConfig::resolve(&cli.overrides())?;
            generate_cmd::run_plan(&resolved, project, *concurrency, output.as_deref()).await?;
        }
        Commands::Validate {
            stage,
            file,
            sequential_days,
            output,
        } => {
            let resolved = WaypointConfig::resolve(&cli.overrides())?;
            let day_policy =
                validate_cmd::effective_day_policy(*sequential_days, resolved.day_policy);
            validate_cmd::run_validate(*stage, file, day_policy, output.as_deref())?;
        }
        Commands::Prompts { command } => {
            let resolved = WaypointConfig::resolve(&cli.overrides())?;
            let catalog = resolved.catalog()?;
            prompts_cmd::run_prompts_command(command.clone(), &catalog)?;
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "waypoint", &mut std::io::stdout());
        }
    }

    Ok(())
}
