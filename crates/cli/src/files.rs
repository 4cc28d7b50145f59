//! JSON file loading and saving for the CLI.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use compiler::WorkflowGraph;
use rules::Rule;

/// Read and parse a single workflow definition.
pub async fn load_workflow(path: &Path) -> Result<WorkflowGraph> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read file {}", path.display()))?;
    WorkflowGraph::from_json(&content).with_context(|| format!("in {}", path.display()))
}

/// Load every `*.json` file in `dir` as a workflow, in file name order.
pub async fn load_workflow_dir(dir: &Path) -> Result<Vec<WorkflowGraph>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot read directory {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        } else {
            debug!("ignoring {}", path.display());
        }
    }
    paths.sort();

    let mut workflows = Vec::with_capacity(paths.len());
    for path in &paths {
        workflows.push(load_workflow(path).await?);
    }
    Ok(workflows)
}

/// Load the rule collection. A missing file is an empty collection.
pub async fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content)
            .with_context(|| format!("invalid rules file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("{} does not exist, starting from an empty rule set", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e).with_context(|| format!("cannot read file {}", path.display())),
    }
}

pub async fn write_rules(path: &Path, rules: &[Rule]) -> Result<()> {
    let json = serde_json::to_string_pretty(rules)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("cannot write file {}", path.display()))
}
