//! Feature command implementations.

use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::cli::FeatureCommands;
use crate::error::Result;
use crate::model::Feature;
use crate::storage::global::lock;
use crate::validate::validate_epic_key;

use super::Project;

#[derive(Serialize)]
struct FeatureListOutput {
    count: usize,
    features: Vec<Feature>,
}

/// Execute feature commands.
///
/// # Errors
///
/// Returns an error if the project is not initialized, the epic key is
/// malformed, or the query fails.
pub fn execute(command: &FeatureCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    match command {
        FeatureCommands::List { epic } => {
            if let Some(epic) = epic {
                validate_epic_key(epic)?;
            }

            let project = Project::load()?;
            let shared = project.open_storage(db_path)?;
            let storage = lock(&shared)?;
            let features = storage.list_features(epic.as_deref())?;

            if json {
                super::print_json(&FeatureListOutput {
                    count: features.len(),
                    features,
                })?;
            } else if features.is_empty() {
                println!("No features found.");
            } else {
                println!("Features ({} found):", features.len());
                println!();
                for feature in &features {
                    println!(
                        "  {} [{}] {}",
                        format!("{:<9}", feature.key).bold(),
                        feature.status,
                        feature.title
                    );
                }
            }
        }
    }
    Ok(())
}
