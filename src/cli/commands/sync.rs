//! Sync command: reconcile the docs folder with the database.
//!
//! The project root is the directory holding `.planbook.json` (or the
//! working directory). The checkpoint lives in that same file.

use std::io::IsTerminal;
use std::path::PathBuf;

use crate::cli::SyncArgs;
use crate::error::Result;
use crate::storage::global::lock;
use crate::sync::{format_report, ConflictStrategy, LinePrompt, SyncEngine, SyncOptions};

use super::Project;

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error if the project cannot be loaded or the sync fails,
/// including a conflict under the manual strategy without a terminal.
pub fn execute(args: &SyncArgs, db_path: Option<&PathBuf>, actor: Option<&str>, json: bool) -> Result<()> {
    let project = Project::load()?;
    let matcher = project.matcher()?;
    let workflow = project.workflow()?;
    let shared = project.open_storage(db_path)?;
    let mut storage = lock(&shared)?;

    let mut options = SyncOptions::new(project.root.clone(), project.docs_root(args.folder.as_deref()));
    options.strategy = args.strategy;
    options.dry_run = args.dry_run;
    options.force_full_scan = args.force_full_scan;
    options.create_missing = args.create_missing;
    if let Some(actor) = actor {
        options.actor = actor.to_string();
    }

    let mut engine = SyncEngine::new(&mut storage, &matcher, &workflow);
    // Without a terminal the engine fails on the first conflict.
    if args.strategy == ConflictStrategy::Manual && std::io::stdin().is_terminal() {
        engine = engine.with_prompt(Box::new(LinePrompt::stdin()));
    }
    let report = engine.run(&options)?;

    if json {
        super::print_json(&report)?;
    } else {
        print!("{}", format_report(&report));
    }

    Ok(())
}
