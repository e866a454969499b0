//! Task command implementations.

use std::path::PathBuf;

use chrono::DateTime;
use colored::Colorize;
use serde::Serialize;

use crate::cli::TaskCommands;
use crate::config::default_actor;
use crate::error::{Error, Result};
use crate::model::Task;
use crate::storage::events::get_status_history;
use crate::storage::global::lock;
use crate::storage::{SqliteStorage, StatusChange, TaskFilter};
use crate::validate::validate_task_key;
use crate::workflow::WorkflowGraph;

use super::Project;

#[derive(Serialize)]
struct TaskListOutput {
    count: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    key: &'a str,
    old_status: &'a str,
    new_status: &'a str,
    forced: bool,
}

#[derive(Serialize)]
struct HistoryOutput<'a> {
    key: &'a str,
    history: Vec<StatusChange>,
}

/// Execute task commands.
///
/// # Errors
///
/// Returns an error if the project is not initialized or the command fails.
pub fn execute(
    command: &TaskCommands,
    db_path: Option<&PathBuf>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let project = Project::load()?;
    let shared = project.open_storage(db_path)?;
    let mut storage = lock(&shared)?;

    match command {
        TaskCommands::List { epic, feature, status } => {
            let workflow = project.workflow()?;
            let status = status.as_deref().map(|s| workflow.normalize(s)).transpose()?;
            let filter = TaskFilter {
                epic: epic.as_deref(),
                feature: feature.as_deref(),
                status: status.as_deref(),
            };
            list(&storage, &filter, json)
        }
        TaskCommands::Get { key } => get(&storage, key, json),
        TaskCommands::SetStatus { key, status, force } => {
            let workflow = project.workflow()?;
            let actor = actor.map_or_else(default_actor, str::to_string);
            set_status(&mut storage, &workflow, key, status, *force, &actor, json)
        }
        TaskCommands::History { key, limit } => history(&storage, key, *limit, json),
    }
}

fn list(storage: &SqliteStorage, filter: &TaskFilter<'_>, json: bool) -> Result<()> {
    let tasks = storage.list_tasks(filter)?;

    if json {
        super::print_json(&TaskListOutput {
            count: tasks.len(),
            tasks,
        })?;
    } else if tasks.is_empty() {
        println!("No tasks found.");
    } else {
        println!("Tasks ({} found):", tasks.len());
        println!();
        for task in &tasks {
            println!(
                "  {} [{}] {}",
                format!("{:<16}", task.key).bold(),
                task.status,
                task.title
            );
        }
    }
    Ok(())
}

fn find_task(storage: &SqliteStorage, key: &str) -> Result<Task> {
    validate_task_key(key)?;
    storage.get_task(key)?.ok_or_else(|| Error::EntityNotFound {
        kind: "task",
        key: key.to_string(),
    })
}

fn get(storage: &SqliteStorage, key: &str, json: bool) -> Result<()> {
    let task = find_task(storage, key)?;

    if json {
        return super::print_json(&task);
    }

    println!("[{}] {}", task.key.bold(), task.title);
    println!();
    println!("Feature:  {}", task.feature_key);
    println!("Status:   {}", task.status);
    println!("Priority: {}", task.priority);
    if let Some(agent) = &task.assigned_agent {
        println!("Agent:    {agent}");
    }
    if let Some(path) = &task.file_path {
        println!("File:     {path}");
    }
    println!("Updated:  {}", format_millis(task.updated_at));
    if let Some(desc) = &task.description {
        println!();
        println!("{desc}");
    }
    Ok(())
}

/// Resolve the requested status, then apply it.
///
/// A forced change still prefers the graph's spelling of the status but
/// accepts a status the graph does not know.
fn set_status(
    storage: &mut SqliteStorage,
    workflow: &WorkflowGraph,
    key: &str,
    status: &str,
    force: bool,
    actor: &str,
    json: bool,
) -> Result<()> {
    let task = find_task(storage, key)?;
    let target = match workflow.normalize(status) {
        Ok(s) => s,
        Err(_) if force => status.trim().to_string(),
        Err(e) => return Err(e),
    };

    let updated = storage.set_task_status(key, &target, workflow, force, actor)?;

    if json {
        super::print_json(&StatusOutput {
            key,
            old_status: &task.status,
            new_status: &updated.status,
            forced: force,
        })?;
    } else {
        let suffix = if force { " (forced)" } else { "" };
        println!("{key}: {} -> {}{suffix}", task.status, updated.status.green());
    }
    Ok(())
}

fn history(storage: &SqliteStorage, key: &str, limit: Option<u32>, json: bool) -> Result<()> {
    find_task(storage, key)?;
    let history = get_status_history(storage.conn(), key, limit)?;

    if json {
        return super::print_json(&HistoryOutput { key, history });
    }

    if history.is_empty() {
        println!("No status changes recorded for {key}.");
        return Ok(());
    }
    println!("History of {key}:");
    for change in &history {
        let forced = if change.forced { " (forced)" } else { "" };
        println!(
            "  {}  {} -> {}  by {} via {}{forced}",
            format_millis(change.created_at),
            change.old_status.as_deref().unwrap_or("-"),
            change.new_status,
            change.actor,
            change.source
        );
    }
    Ok(())
}

pub(crate) fn format_millis(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map_or_else(|| ms.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;
    use crate::storage::{insert_record, NewRecord};

    fn storage_with_task() -> SqliteStorage {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .mutate("seed", "test", |tx, _| {
                for (kind, key, parent) in [
                    (EntityKind::Epic, "E01", None),
                    (EntityKind::Feature, "E01-F01", Some("E01")),
                    (EntityKind::Task, "T-E01-F01-001", Some("E01-F01")),
                ] {
                    insert_record(
                        tx,
                        &NewRecord {
                            kind,
                            key: key.to_string(),
                            parent_key: parent.map(str::to_string),
                            title: key.to_string(),
                            description: None,
                            status: "todo".to_string(),
                            priority: None,
                            assigned_agent: None,
                            file_path: None,
                            file_mtime: None,
                        },
                        1_000,
                    )?;
                }
                Ok(())
            })
            .unwrap();
        storage
    }

    #[test]
    fn test_set_status_normalizes_and_records_history() {
        let mut storage = storage_with_task();
        let workflow = WorkflowGraph::default();

        set_status(&mut storage, &workflow, "T-E01-F01-001", "In Progress", false, "alice", true).unwrap();

        let task = storage.get_task("T-E01-F01-001").unwrap().unwrap();
        assert_eq!(task.status, "in_progress");

        let history = get_status_history(storage.conn(), "T-E01-F01-001", None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_status.as_deref(), Some("todo"));
        assert_eq!(history[0].actor, "alice");
        assert_eq!(history[0].source, "manual");
    }

    #[test]
    fn test_set_status_rejects_illegal_transition() {
        let mut storage = storage_with_task();
        let workflow = WorkflowGraph::default();

        let err = set_status(&mut storage, &workflow, "T-E01-F01-001", "completed", false, "a", true)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(storage.get_task("T-E01-F01-001").unwrap().unwrap().status, "todo");
    }

    #[test]
    fn test_set_status_force_bypasses_workflow() {
        let mut storage = storage_with_task();
        let workflow = WorkflowGraph::default();

        set_status(&mut storage, &workflow, "T-E01-F01-001", "completed", true, "a", true).unwrap();

        let history = get_status_history(storage.conn(), "T-E01-F01-001", None).unwrap();
        assert!(history[0].forced);
    }

    #[test]
    fn test_unknown_task_is_not_found() {
        let storage = storage_with_task();
        let err = find_task(&storage, "T-E01-F01-009").unwrap_err();
        assert!(matches!(err, Error::EntityNotFound { kind: "task", .. }));

        let err = find_task(&storage, "bogus").unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0), "1970-01-01 00:00:00");
    }
}
