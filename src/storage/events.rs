//! Task status history.
//!
//! Every persisted status change appends one row, inside the transaction
//! that made the change.

use rusqlite::{Connection, Result};
use serde::Serialize;

/// What caused a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSource {
    /// Imported from a markdown file by `pb sync`.
    Sync,
    /// Set directly with `pb task set-status`.
    Manual,
}

impl ChangeSource {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Manual => "manual",
        }
    }
}

/// A status history row.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub id: i64,
    pub task_key: String,
    pub old_status: Option<String>,
    pub new_status: String,
    pub actor: String,
    pub source: String,
    pub forced: bool,
    pub created_at: i64,
}

impl StatusChange {
    /// Create a new history row (id will be assigned by database).
    #[must_use]
    pub fn new(
        task_key: &str,
        old_status: Option<&str>,
        new_status: &str,
        actor: &str,
        source: ChangeSource,
        created_at: i64,
    ) -> Self {
        Self {
            id: 0,
            task_key: task_key.to_string(),
            old_status: old_status.map(str::to_string),
            new_status: new_status.to_string(),
            actor: actor.to_string(),
            source: source.as_str().to_string(),
            forced: false,
            created_at,
        }
    }

    /// Mark the change as having bypassed workflow validation.
    #[must_use]
    pub fn forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }
}

/// Insert a history row.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_status_change(conn: &Connection, change: &StatusChange) -> Result<i64> {
    conn.execute(
        "INSERT INTO task_history (task_key, old_status, new_status, actor, source, forced, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            change.task_key,
            change.old_status,
            change.new_status,
            change.actor,
            change.source,
            change.forced,
            change.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// History of one task, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_status_history(conn: &Connection, task_key: &str, limit: Option<u32>) -> Result<Vec<StatusChange>> {
    let limit = limit.unwrap_or(100);
    let mut stmt = conn.prepare(
        "SELECT id, task_key, old_status, new_status, actor, source, forced, created_at
         FROM task_history
         WHERE task_key = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(rusqlite::params![task_key, limit], |row| {
        Ok(StatusChange {
            id: row.get(0)?,
            task_key: row.get(1)?,
            old_status: row.get(2)?,
            new_status: row.get(3)?,
            actor: row.get(4)?,
            source: row.get(5)?,
            forced: row.get(6)?,
            created_at: row.get(7)?,
        })
    })?;

    rows.collect()
}
