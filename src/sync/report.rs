//! Human-readable sync report.

use std::fmt::Write as _;

use colored::Colorize;

use crate::sync::types::{EntityCounts, Resolution, SyncReport};

/// Render a report for the terminal.
#[must_use]
pub fn format_report(report: &SyncReport) -> String {
    let mut out = String::new();

    if report.dry_run {
        let _ = writeln!(out, "{}\n", "DRY RUN: no changes were written".yellow().bold());
    }

    let _ = writeln!(out, "{}", "Sync Summary".bold().underline());
    let _ = writeln!(out, "  Files scanned:      {}", report.files_scanned);
    let _ = writeln!(
        out,
        "  Files changed:      {} ({} new, {} unchanged since last sync)",
        report.files_changed, report.new_files, report.files_skipped
    );
    let _ = writeln!(out, "  Created:            {}", counts(&report.created));
    let _ = writeln!(out, "  Updated:            {}", counts(&report.updated));
    let _ = writeln!(out, "  Unchanged:          {}", report.unchanged);
    let _ = writeln!(
        out,
        "  Conflicts:          {} detected, {} resolved ({})",
        report.conflicts_detected, report.conflicts_resolved, report.strategy
    );
    let _ = writeln!(out, "  Warnings:           {}", report.warnings.len());
    let _ = writeln!(out, "  Errors:             {}", report.errors.len());
    let _ = writeln!(out, "  Elapsed:            {}ms", report.elapsed_ms);

    if !report.conflicts.is_empty() {
        let _ = writeln!(out, "\n{}", "Conflicts:".yellow().bold());
        for conflict in &report.conflicts {
            let resolution = match conflict.resolution {
                Some(Resolution::File) => "file".green(),
                Some(Resolution::Database) => "database".cyan(),
                Some(Resolution::Skipped) | None => "skipped".dimmed(),
            };
            let _ = writeln!(out, "  {} ({}):", conflict.key.bold(), conflict.file_path);
            let _ = writeln!(out, "    Field:      {}", conflict.field);
            let _ = writeln!(
                out,
                "    Database:   {:?}",
                conflict.db_value.as_deref().unwrap_or_default()
            );
            let _ = writeln!(out, "    File:       {:?}", conflict.file_value);
            let _ = writeln!(out, "    Resolution: {resolution}");
        }
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out, "\n{}", "Warnings:".yellow().bold());
        for warning in &report.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }

    if !report.errors.is_empty() {
        let _ = writeln!(out, "\n{}", "Errors:".red().bold());
        for error in &report.errors {
            let _ = writeln!(out, "  - {error}");
        }
    }

    out.push('\n');
    if !report.has_changes() && report.errors.is_empty() {
        let _ = writeln!(out, "{}", "No changes.".green());
    } else if report.checkpoint_advanced {
        if let Some(checkpoint) = &report.checkpoint {
            let _ = writeln!(out, "{}", format!("Checkpoint advanced to {checkpoint}").dimmed());
        }
    } else if report.dry_run {
        let _ = writeln!(out, "{}", "Run without --dry-run to apply.".dimmed());
    }

    out
}

fn counts(c: &EntityCounts) -> String {
    format!("{} epics, {} features, {} tasks", c.epics, c.features, c.tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;
    use crate::sync::types::{ConflictRecord, ConflictStrategy};

    #[test]
    fn test_report_lists_conflicts_and_warnings() {
        colored::control::set_override(false);

        let report = SyncReport {
            files_scanned: 3,
            files_changed: 1,
            conflicts_detected: 1,
            conflicts_resolved: 1,
            conflicts: vec![ConflictRecord {
                key: "T-E01-F01-001".to_string(),
                kind: EntityKind::Task,
                file_path: "docs/plan/t.md".to_string(),
                field: "status".to_string(),
                file_value: "completed".to_string(),
                db_value: Some("blocked".to_string()),
                file_mtime: 2,
                db_updated_at: 1,
                resolution: Some(Resolution::File),
                strategy: ConflictStrategy::FileWins,
            }],
            warnings: vec!["docs/plan/x.md: invalid frontmatter".to_string()],
            ..SyncReport::default()
        };

        let text = format_report(&report);
        assert!(text.contains("Files scanned:      3"));
        assert!(text.contains("1 detected, 1 resolved (file-wins)"));
        assert!(text.contains("Database:   \"blocked\""));
        assert!(text.contains("Resolution: file"));
        assert!(text.contains("- docs/plan/x.md: invalid frontmatter"));
    }

    #[test]
    fn test_dry_run_banner() {
        colored::control::set_override(false);
        let report = SyncReport {
            dry_run: true,
            ..SyncReport::default()
        };
        let text = format_report(&report);
        assert!(text.starts_with("DRY RUN"));
        assert!(text.contains("No changes."));
    }
}
