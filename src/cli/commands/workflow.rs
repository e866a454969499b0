//! Workflow command implementations.

use colored::Colorize;
use serde::Serialize;

use crate::cli::WorkflowCommands;
use crate::error::Result;
use crate::workflow::{validate_workflow, StatusMetadata, WorkflowGraph};

use super::Project;

#[derive(Serialize)]
struct StatusEntry<'a> {
    status: &'a str,
    transitions: &'a [String],
    start: bool,
    complete: bool,
    #[serde(flatten)]
    metadata: Option<&'a StatusMetadata>,
}

#[derive(Serialize)]
struct WorkflowOutput<'a> {
    source: &'static str,
    statuses: Vec<StatusEntry<'a>>,
}

#[derive(Serialize)]
struct ValidateOutput {
    valid: bool,
    source: &'static str,
}

/// Execute workflow commands.
///
/// # Errors
///
/// Returns `Error::InvalidWorkflow` if the configured workflow is malformed.
pub fn execute(command: &WorkflowCommands, json: bool) -> Result<()> {
    let project = Project::load()?;
    match command {
        WorkflowCommands::List => list(&project, json),
        WorkflowCommands::Validate => validate(&project, json),
    }
}

const fn source(project: &Project) -> &'static str {
    if project.config.status_flow.is_some() {
        "config"
    } else {
        "default"
    }
}

fn list(project: &Project, json: bool) -> Result<()> {
    let graph = project.workflow()?;
    let statuses = graph.statuses();
    let entries: Vec<StatusEntry<'_>> = statuses
        .iter()
        .map(|status| entry(&graph, status))
        .collect();

    if json {
        return super::print_json(&WorkflowOutput {
            source: source(project),
            statuses: entries,
        });
    }

    println!("Workflow ({}):", source(project));
    println!();
    for e in &entries {
        let marker = if e.start {
            "start"
        } else if e.complete {
            "done"
        } else {
            ""
        };
        let next = if e.transitions.is_empty() {
            "(terminal)".dimmed().to_string()
        } else {
            e.transitions.join(", ")
        };
        println!("  {} {marker:<6} -> {next}", format!("{:<20}", e.status).bold());
        if let Some(desc) = e.metadata.and_then(|m| m.description.as_deref()) {
            println!("  {:<27} {}", "", desc.dimmed());
        }
    }
    Ok(())
}

fn entry<'g>(graph: &'g WorkflowGraph, status: &'g str) -> StatusEntry<'g> {
    StatusEntry {
        status,
        transitions: graph.next_statuses(status),
        start: graph.start_statuses().iter().any(|s| s == status),
        complete: graph.is_complete(status),
        metadata: graph.metadata(status),
    }
}

fn validate(project: &Project, json: bool) -> Result<()> {
    if let Some(config) = project.config.workflow_config() {
        validate_workflow(&config)?;
    }

    if json {
        super::print_json(&ValidateOutput {
            valid: true,
            source: source(project),
        })?;
    } else if project.config.status_flow.is_some() {
        println!("{}", "Workflow configuration is valid.".green());
    } else {
        println!("No status_flow configured; the default workflow is in use.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_marks_start_and_terminal() {
        let graph = WorkflowGraph::default();

        let todo = entry(&graph, "todo");
        assert!(todo.start);
        assert!(!todo.complete);
        assert_eq!(todo.transitions, &["in_progress".to_string(), "blocked".to_string()]);

        let done = entry(&graph, "completed");
        assert!(done.complete);
        assert!(done.transitions.is_empty());
    }

    #[test]
    fn test_entry_serializes_metadata_inline() {
        let graph = WorkflowGraph::default();
        let value = serde_json::to_value(entry(&graph, "todo")).unwrap();
        assert_eq!(value["status"], "todo");
        assert_eq!(value["start"], true);
    }
}
