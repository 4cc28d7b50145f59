//! `helpdesk-workflows` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`: report structural problems in a workflow JSON file.
//! - `compile` : print the rules a workflow compiles to.
//! - `optimize`: repair a workflow and print what changed.
//! - `sync`    : recompile a directory of workflows into a rules file.

mod files;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use compiler::{decompose, optimize, validate, Severity};
use rule_sync::{InMemoryWorkflowRepository, RuleSync, SyncConfig, SyncError};
use rules::InMemoryRuleStore;

#[derive(Parser)]
#[command(
    name = "helpdesk-workflows",
    about = "Compile ticket-lifecycle workflows into automation rules",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Compile a workflow into rules and print them as JSON.
    Compile {
        path: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
    /// Repair a workflow and print the changes applied.
    Optimize {
        path: PathBuf,
        /// Where to write the repaired workflow (stdout if omitted).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Recompile every workflow in a directory into a rules file.
    Sync {
        /// Directory containing workflow JSON files.
        workflows: PathBuf,
        /// Rules file to update in place.
        #[arg(long)]
        rules: PathBuf,
        /// Skip workflows with validation errors instead of compiling them.
        #[arg(long, env = "HELPDESK_REQUIRE_VALID")]
        require_valid: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let workflow = files::load_workflow(&path).await?;
            let result = validate(&workflow);

            for finding in &result.errors {
                let marker = match finding.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                };
                println!("{marker}: {}", finding.message);
            }
            if result.valid {
                println!("✅ Workflow '{}' is valid.", workflow.name);
            } else {
                eprintln!("❌ Workflow '{}' failed validation.", workflow.name);
                std::process::exit(1);
            }
        }
        Command::Compile { path, pretty } => {
            let workflow = files::load_workflow(&path).await?;
            let rules = decompose(&workflow);
            let json = if pretty {
                serde_json::to_string_pretty(&rules)?
            } else {
                serde_json::to_string(&rules)?
            };
            println!("{json}");
        }
        Command::Optimize { path, output } => {
            let workflow = files::load_workflow(&path).await?;
            let result = optimize(&workflow);

            for change in &result.changes {
                eprintln!("{}", change.description);
            }
            let json = serde_json::to_string_pretty(&result.workflow)?;
            match output {
                Some(out) => {
                    tokio::fs::write(&out, json).await?;
                    info!("wrote repaired workflow to {}", out.display());
                }
                None => println!("{json}"),
            }
        }
        Command::Sync {
            workflows,
            rules,
            require_valid,
        } => {
            let graphs = files::load_workflow_dir(&workflows).await?;
            let existing = files::load_rules(&rules).await?;
            let mut ids: Vec<_> = graphs.iter().map(|wf| wf.id).collect();
            ids.sort();

            let sync = RuleSync::new(
                InMemoryWorkflowRepository::with_workflows(graphs),
                InMemoryRuleStore::with_rules(existing),
                SyncConfig { require_valid },
            );
            // Disabled workflows are synced too so their rules end up disabled.
            for id in ids {
                match sync.sync_workflow(id).await {
                    Ok(report) => println!("{}", serde_json::to_string(&report)?),
                    Err(e @ SyncError::InvalidWorkflow { .. }) => eprintln!("skipped {id}: {e}"),
                    Err(e) => return Err(e.into()),
                }
            }

            let (_, store) = sync.into_parts();
            let merged = store.into_rules();
            files::write_rules(&rules, &merged).await?;
            info!("wrote {} rule(s) to {}", merged.len(), rules.display());
        }
    }

    Ok(())
}
