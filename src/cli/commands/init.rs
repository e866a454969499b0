//! Initialize a Planbook project.
//!
//! Writes `.planbook.json` in the current directory, creates the docs
//! root and creates the database with its schema. The sync checkpoint
//! starts out absent, so the first `pb sync` compares every file.

use crate::config::{config_path, resolve_db_path, ProjectConfig, DEFAULT_DOCS_ROOT};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use crate::sync::atomic_write;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct InitOutput {
    path: PathBuf,
    config: PathBuf,
    docs_root: PathBuf,
    database: PathBuf,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `Error::AlreadyInitialized` if `.planbook.json` exists and
/// `force` is not set, or an error if a file cannot be written.
pub fn execute(docs_root: Option<&str>, force: bool, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let output = init_at(&root, docs_root, force, db_path)?;

    if json {
        super::print_json(&output)?;
    } else {
        println!("Initialized Planbook project in {}", output.path.display());
        println!("  Config:    {}", output.config.display());
        println!("  Docs root: {}", output.docs_root.display());
        println!("  Database:  {}", output.database.display());
        println!();
        println!("Next: add epic folders under the docs root and run 'pb sync'.");
    }

    Ok(())
}

fn init_at(root: &Path, docs_root: Option<&str>, force: bool, db_path: Option<&PathBuf>) -> Result<InitOutput> {
    let config_file = config_path(root);
    if config_file.exists() && !force {
        return Err(Error::AlreadyInitialized { path: config_file });
    }

    let config = ProjectConfig {
        docs_root: Some(docs_root.unwrap_or(DEFAULT_DOCS_ROOT).to_string()),
        database: db_path.map(|p| p.display().to_string()),
        ..ProjectConfig::default()
    };
    let mut content = serde_json::to_string_pretty(&config)?;
    content.push('\n');
    atomic_write(&config_file, &content)?;

    let docs = config.docs_root(root, None);
    fs::create_dir_all(&docs)?;

    let database = resolve_db_path(None, root, &config);
    if let Some(parent) = database.parent() {
        fs::create_dir_all(parent)?;
    }
    // Opening applies the schema.
    SqliteStorage::open(&database)?;

    tracing::info!(root = %root.display(), "Initialized project");
    Ok(InitOutput {
        path: root.to_path_buf(),
        config: config_file,
        docs_root: docs,
        database,
    })
}
