//! Discover command: show how the docs folder is classified.

use std::path::Path;

use colored::Colorize;

use crate::discovery::{FolderScanner, ScanResult};
use crate::error::Result;

use super::Project;

/// Execute the discover command.
///
/// Read-only: nothing is written to the database.
///
/// # Errors
///
/// Returns an error if the patterns are invalid or the docs root is missing.
pub fn execute(folder: Option<&Path>, json: bool) -> Result<()> {
    let project = Project::load()?;
    let matcher = project.matcher()?;
    let docs_root = project.docs_root(folder);

    let result = FolderScanner::new(&matcher).scan(&docs_root)?;

    if json {
        super::print_json(&result)?;
    } else {
        print_scan(&docs_root, &result);
    }
    Ok(())
}

fn relative<'p>(root: &Path, path: &'p Path) -> &'p Path {
    path.strip_prefix(root).unwrap_or(path)
}

fn print_scan(root: &Path, result: &ScanResult) {
    println!("Discovered in {}:", root.display());
    println!();

    for epic in &result.epics {
        println!("{} {}", epic.key.bold(), relative(root, &epic.path).display());
        if let Some(doc) = &epic.doc_path {
            println!("    doc: {}", relative(root, doc).display());
        }
        for feature in result.features.iter().filter(|f| f.epic_key == epic.key) {
            println!("  {} {}", feature.key.cyan(), relative(root, &feature.path).display());
            if let Some(prd) = &feature.prd_path {
                println!("      prd: {}", relative(root, prd).display());
            }
            for doc in &feature.related_docs {
                println!("      related: {}", relative(root, doc).display());
            }
        }
    }

    println!();
    println!(
        "{} epics, {} features, {} related docs ({} folders, {} files)",
        result.epics.len(),
        result.features.len(),
        result.stats.related_docs,
        result.stats.folders_scanned,
        result.stats.files_analyzed
    );

    if !result.warnings.is_empty() {
        println!();
        println!("{}", "Warnings:".yellow().bold());
        for warning in &result.warnings {
            println!("  - {warning}");
        }
    }
}
