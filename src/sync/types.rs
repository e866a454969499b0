//! Sync types: options, candidates, conflicts and the report.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::Error;
use crate::model::EntityKind;

/// Conflict resolution strategy.
///
/// Applies when a tracked field differs and both the file and the
/// database row changed since the last sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Overwrite the database value with the file value.
    #[default]
    FileWins,
    /// Keep the database value; the file is not rewritten.
    #[value(alias = "database-wins")]
    DbWins,
    /// Take whichever side was modified more recently.
    NewerWins,
    /// Ask for each conflict.
    Manual,
}

impl ConflictStrategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FileWins => "file-wins",
            Self::DbWins => "db-wins",
            Self::NewerWins => "newer-wins",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side a conflict was settled in favor of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    File,
    Database,
    Skipped,
}

impl Resolution {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Database => "database",
            Self::Skipped => "skipped",
        }
    }
}

/// Options for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Directory holding `.planbook.json` (checkpoint location).
    pub project_root: PathBuf,
    /// Markdown tree to scan.
    pub docs_root: PathBuf,
    pub strategy: ConflictStrategy,
    pub dry_run: bool,
    /// Ignore the checkpoint and consider every file.
    pub force_full_scan: bool,
    /// Create placeholder epics/features for tasks whose parents are unknown.
    pub create_missing: bool,
    /// Actor recorded in status history.
    pub actor: String,
}

impl SyncOptions {
    #[must_use]
    pub fn new(project_root: PathBuf, docs_root: PathBuf) -> Self {
        Self {
            project_root,
            docs_root,
            strategy: ConflictStrategy::default(),
            dry_run: false,
            force_full_scan: false,
            create_missing: false,
            actor: "sync".to_string(),
        }
    }
}

/// One entity as read from disk during a sync.
///
/// `fields` holds only the tracked fields the file actually carries;
/// `fallback_title` is used when inserting a row whose file has no title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeCandidate {
    pub kind: EntityKind,
    pub key: String,
    pub parent_key: Option<String>,
    /// Path stored on the row (relative to the project root when possible).
    pub file_path: String,
    /// Modification time, Unix milliseconds.
    pub mtime: i64,
    /// Whether the candidate is backed by a file rather than a bare folder.
    pub is_file: bool,
    pub fields: BTreeMap<&'static str, String>,
    pub fallback_title: String,
    pub priority: Option<i32>,
    pub assigned_agent: Option<String>,
}

impl ChangeCandidate {
    /// File-side value of a tracked field, if the file carries it.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A field whose file and database values diverged after both changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRecord {
    pub key: String,
    pub kind: EntityKind,
    pub file_path: String,
    pub field: String,
    pub file_value: String,
    pub db_value: Option<String>,
    /// File modification time, Unix milliseconds.
    pub file_mtime: i64,
    /// Row `updated_at`, Unix milliseconds.
    pub db_updated_at: i64,
    pub resolution: Option<Resolution>,
    pub strategy: ConflictStrategy,
}

/// Per-kind counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub epics: usize,
    pub features: usize,
    pub tasks: usize,
}

impl EntityCounts {
    pub fn add(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Epic => self.epics += 1,
            EntityKind::Feature => self.features += 1,
            EntityKind::Task => self.tasks += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.epics + self.features + self.tasks
    }
}

/// Outcome of a sync run, in human and machine form.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub strategy: ConflictStrategy,
    pub files_scanned: usize,
    /// Files kept by the incremental filter.
    pub files_changed: usize,
    /// Files dropped by the incremental filter.
    pub files_skipped: usize,
    /// Kept files with no row yet.
    pub new_files: usize,
    pub created: EntityCounts,
    pub updated: EntityCounts,
    pub unchanged: usize,
    pub conflicts_detected: usize,
    /// Conflicts settled for one side (skipped ones excluded).
    pub conflicts_resolved: usize,
    pub conflicts: Vec<ConflictRecord>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub elapsed_ms: u64,
    /// Whether a new checkpoint was written.
    pub checkpoint_advanced: bool,
    /// Checkpoint in effect after the run (RFC 3339).
    pub checkpoint: Option<String>,
}

impl SyncReport {
    /// Whether the run wrote (or, in dry-run, would write) anything.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.created.total() + self.updated.total() > 0
    }
}

/// Errors specific to sync.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The docs root does not exist.
    #[error("Docs root does not exist: {}", path.display())]
    DocsRootMissing { path: PathBuf },

    /// The database was committed but the checkpoint could not be saved.
    #[error("Failed to write sync checkpoint to {}: {source}", path.display())]
    Checkpoint {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A write inside the sync transaction failed; nothing was committed.
    #[error("Failed to write {kind} {key} from {file}: {source}")]
    Write {
        kind: EntityKind,
        key: String,
        file: String,
        source: Box<Error>,
    },

    /// The manual strategy needs a way to ask.
    #[error("Manual conflict resolution requires an interactive terminal")]
    PromptUnavailable,
}

impl SyncError {
    /// Recovery hint for the CLI.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::DocsRootMissing { .. } => Some(
                "Create the folder, set docs_root in .planbook.json, or pass --folder".to_string(),
            ),
            Self::Checkpoint { .. } => Some(
                "The database is up to date; the next sync will reprocess files changed since the previous checkpoint."
                    .to_string(),
            ),
            Self::Write { source, file, .. } => {
                let inner = source
                    .hint()
                    .map_or_else(String::new, |h| format!("\n  {h}"));
                Some(format!(
                    "No changes were committed. Fix {file} and run `pb sync` again.{inner}"
                ))
            }
            Self::PromptUnavailable => {
                Some("Use --strategy file-wins, db-wins or newer-wins when not running interactively".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_default_and_names() {
        assert_eq!(ConflictStrategy::default(), ConflictStrategy::FileWins);
        assert_eq!(ConflictStrategy::DbWins.to_string(), "db-wins");
        assert_eq!(
            serde_json::to_value(ConflictStrategy::NewerWins).unwrap(),
            serde_json::json!("newer-wins")
        );
    }

    #[test]
    fn test_strategy_parses_alias() {
        use clap::ValueEnum;
        assert_eq!(
            ConflictStrategy::from_str("database-wins", false).unwrap(),
            ConflictStrategy::DbWins
        );
    }

    #[test]
    fn test_entity_counts() {
        let mut counts = EntityCounts::default();
        counts.add(EntityKind::Task);
        counts.add(EntityKind::Task);
        counts.add(EntityKind::Epic);
        assert_eq!(counts.tasks, 2);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_write_error_hint_includes_inner_hint() {
        let err = SyncError::Write {
            kind: EntityKind::Task,
            key: "T-E01-F01-001".to_string(),
            file: "docs/plan/t.md".to_string(),
            source: Box::new(Error::InvalidTransition {
                from: "todo".to_string(),
                to: "completed".to_string(),
                allowed: vec!["in_progress".to_string()],
            }),
        };
        let hint = err.hint().unwrap();
        assert!(hint.contains("docs/plan/t.md"));
        assert!(hint.contains("in_progress"));
        assert!(err.to_string().contains("T-E01-F01-001"));
    }
}
