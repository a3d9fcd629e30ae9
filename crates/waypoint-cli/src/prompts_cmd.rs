//! `waypoint prompts`: inspect the prompt catalog and stage schemas.

use std::path::Path;

use anyhow::{Context, Result};

use waypoint_core::{PromptCatalog, SchemaRegistry, Stage};

use crate::PromptCommands;
use crate::io::write_json;

/// Execute a `waypoint prompts` subcommand against `catalog`.
pub fn run_prompts_command(command: PromptCommands, catalog: &PromptCatalog) -> Result<()> {
    match command {
        PromptCommands::List => {
            print!("{}", render_list(catalog));
            Ok(())
        }
        PromptCommands::Show { stage } => {
            print!("{}", render_prompt(catalog, stage));
            Ok(())
        }
        PromptCommands::Schema { stage } => {
            write_json(&SchemaRegistry::standard().json_schema(stage), None)
        }
        PromptCommands::Export { output } => export(catalog, output.as_deref()),
    }
}

fn render_list(catalog: &PromptCatalog) -> String {
    let mut out = format!("{:<16} {:<8} {:<12} {}\n", "STAGE", "VERSION", "DIGEST", "CHARS");
    for entry in catalog.entries() {
        out.push_str(&format!(
            "{:<16} {:<8} {:<12} {}\n",
            entry.stage(),
            entry.version(),
            &entry.digest()[..12],
            entry.text().chars().count()
        ));
    }
    out
}

fn render_prompt(catalog: &PromptCatalog, stage: Stage) -> String {
    let entry = catalog.get(stage);
    format!(
        "# {stage} (version {}, sha256 {})\n\n{}\n",
        entry.version(),
        entry.digest(),
        entry.text()
    )
}

fn export(catalog: &PromptCatalog, output: Option<&Path>) -> Result<()> {
    let text = catalog.to_toml_string()?;
    match output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("cannot write prompt catalog: {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
