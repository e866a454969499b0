//! Epic command implementations.

use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::cli::EpicCommands;
use crate::error::Result;
use crate::model::Epic;
use crate::storage::global::lock;

use super::Project;

#[derive(Serialize)]
struct EpicListOutput {
    count: usize,
    epics: Vec<Epic>,
}

/// Execute epic commands.
///
/// # Errors
///
/// Returns an error if the project is not initialized or the query fails.
pub fn execute(command: &EpicCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let project = Project::load()?;
    let shared = project.open_storage(db_path)?;
    let storage = lock(&shared)?;

    match command {
        EpicCommands::List => {
            let epics = storage.list_epics()?;
            if json {
                super::print_json(&EpicListOutput {
                    count: epics.len(),
                    epics,
                })?;
            } else if epics.is_empty() {
                println!("No epics found. Run 'pb sync' to import them.");
            } else {
                println!("Epics ({} found):", epics.len());
                println!();
                for epic in &epics {
                    let source = epic.file_path.as_deref().unwrap_or("(auto-created)");
                    println!("  {} [{}] {}", format!("{:<6}", epic.key).bold(), epic.status, epic.title);
                    println!("         {}", source.dimmed());
                }
            }
        }
    }
    Ok(())
}
