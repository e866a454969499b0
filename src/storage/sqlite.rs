//! SQLite storage implementation.
//!
//! Reads go through `&self`. Every write goes through [`SqliteStorage::mutate`],
//! which wraps the work in one IMMEDIATE transaction and appends the
//! status history collected on the [`MutationContext`] before committing.
//! The row-level write helpers ([`insert_record`], [`update_record`]) take a
//! plain connection so that a caller can batch many of them inside one
//! `mutate` closure.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Row, Transaction};

use crate::error::{Error, Result};
use crate::model::{EntityKind, EntityRecord, Epic, Feature, Task};
use crate::storage::events::{insert_status_change, ChangeSource, StatusChange};
use crate::storage::schema::apply_schema;
use crate::workflow::WorkflowGraph;

/// Keys per `IN (...)` query, well under SQLite's parameter limit.
const KEY_BATCH: usize = 500;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, tracking side effects.
///
/// Status changes recorded here are written to `task_history` just
/// before the transaction commits.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation.
    pub actor: String,
    pub history: Vec<StatusChange>,
}

impl MutationContext {
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            history: Vec::new(),
        }
    }

    /// Record a task status change for this operation.
    pub fn record_status_change(
        &mut self,
        task_key: &str,
        old_status: Option<&str>,
        new_status: &str,
        source: ChangeSource,
        at: i64,
    ) {
        self.history.push(StatusChange::new(
            task_key,
            old_status,
            new_status,
            &self.actor,
            source,
            at,
        ));
    }
}

/// Values for a new epic, feature or task row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub kind: EntityKind,
    pub key: String,
    /// Epic key for a feature, feature key for a task.
    pub parent_key: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: Option<i32>,
    pub assigned_agent: Option<String>,
    pub file_path: Option<String>,
    pub file_mtime: Option<i64>,
}

/// Column changes for an existing row. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub file_path: Option<String>,
    pub file_mtime: Option<i64>,
}

impl RecordUpdate {
    /// Whether the update changes anything besides `file_mtime`.
    ///
    /// Only such updates bump `updated_at`.
    #[must_use]
    pub fn changes_content(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.status.is_some()
            || self.file_path.is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.changes_content() && self.file_mtime.is_none()
    }
}

/// Filters for `list_tasks`.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter<'a> {
    pub epic: Option<&'a str>,
    pub feature: Option<&'a str>,
    pub status: Option<&'a str>,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes the recorded status history
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        // Dropping `tx` on an early return rolls back
        let result = f(&tx, &mut ctx)?;

        for change in &ctx.history {
            insert_status_change(&tx, change)?;
        }

        tx.commit()?;
        tracing::debug!(op, history = ctx.history.len(), "Committed mutation");

        Ok(result)
    }

    // ==================
    // Reads
    // ==================

    /// Get an epic by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_epic(&self, key: &str) -> Result<Option<Epic>> {
        let sql = format!("{EPIC_SELECT} WHERE e.key = ?1");
        Ok(self.conn.query_row(&sql, [key], map_epic).optional()?)
    }

    /// List all epics ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_epics(&self) -> Result<Vec<Epic>> {
        let sql = format!("{EPIC_SELECT} ORDER BY e.key");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_epic)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Get a feature by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_feature(&self, key: &str) -> Result<Option<Feature>> {
        let sql = format!("{FEATURE_SELECT} WHERE f.key = ?1");
        Ok(self.conn.query_row(&sql, [key], map_feature).optional()?)
    }

    /// List features, optionally for one epic.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_features(&self, epic: Option<&str>) -> Result<Vec<Feature>> {
        let sql = format!("{FEATURE_SELECT} WHERE (?1 IS NULL OR e.key = ?1) ORDER BY f.key");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([epic], map_feature)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Get a task by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_task(&self, key: &str) -> Result<Option<Task>> {
        let sql = format!("{TASK_SELECT} WHERE t.key = ?1");
        Ok(self.conn.query_row(&sql, [key], map_task).optional()?)
    }

    /// List tasks matching a filter, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_tasks(&self, filter: &TaskFilter<'_>) -> Result<Vec<Task>> {
        let sql = format!(
            "{TASK_SELECT}
             WHERE (?1 IS NULL OR e.key = ?1)
               AND (?2 IS NULL OR f.key = ?2)
               AND (?3 IS NULL OR t.status = ?3)
             ORDER BY t.key"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params![filter.epic, filter.feature, filter.status],
            map_task,
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Batch-load the shared columns of rows of one kind, keyed by entity key.
    ///
    /// Keys with no row are simply absent from the map.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn get_records(&self, kind: EntityKind, keys: &[String]) -> Result<HashMap<String, EntityRecord>> {
        let mut records = HashMap::with_capacity(keys.len());

        for chunk in keys.chunks(KEY_BATCH) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT id, key, title, description, status, file_path, file_mtime, updated_at
                 FROM {} WHERE key IN ({placeholders})",
                kind.table()
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(chunk), |row| {
                Ok(EntityRecord {
                    kind,
                    id: row.get(0)?,
                    key: row.get(1)?,
                    title: row.get(2)?,
                    description: row.get(3)?,
                    status: row.get(4)?,
                    file_path: row.get(5)?,
                    file_mtime: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })?;
            for record in rows {
                let record = record?;
                records.insert(record.key.clone(), record);
            }
        }

        Ok(records)
    }

    // ==================
    // Writes
    // ==================

    /// Change a task's status outside of sync.
    ///
    /// The transition is validated against `workflow` unless `force` is
    /// set; a forced change is flagged in the history row.
    ///
    /// # Errors
    ///
    /// Returns `Error::EntityNotFound` if the task doesn't exist, a
    /// workflow error if the transition is illegal, or a database error.
    pub fn set_task_status(
        &mut self,
        key: &str,
        status: &str,
        workflow: &WorkflowGraph,
        force: bool,
        actor: &str,
    ) -> Result<Task> {
        let task = self.get_task(key)?.ok_or_else(|| Error::EntityNotFound {
            kind: "task",
            key: key.to_string(),
        })?;

        if force {
            if task.status == status {
                return Err(Error::SelfTransition { status: status.to_string() });
            }
        } else {
            workflow.validate_transition(&task.status, status)?;
        }

        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("set_task_status", actor, |tx, ctx| {
            let update = RecordUpdate {
                status: Some(status.to_string()),
                ..RecordUpdate::default()
            };
            update_record(tx, EntityKind::Task, key, &update, now)?;
            ctx.history.push(
                StatusChange::new(key, Some(task.status.as_str()), status, actor, ChangeSource::Manual, now)
                    .forced(force),
            );
            Ok(())
        })?;

        self.get_task(key)?.ok_or_else(|| Error::EntityNotFound {
            kind: "task",
            key: key.to_string(),
        })
    }
}

// ==================
// Row-level writes
// ==================

/// Insert a new row.
///
/// A feature's epic and a task's feature are looked up by key; a missing
/// parent fails the insert (and with it the surrounding transaction).
///
/// # Errors
///
/// Returns an error if the insert violates a constraint.
pub fn insert_record(conn: &Connection, record: &NewRecord, now: i64) -> Result<i64> {
    match record.kind {
        EntityKind::Epic => {
            conn.execute(
                "INSERT INTO epics (key, title, description, status, file_path, file_mtime, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    record.key,
                    record.title,
                    record.description,
                    record.status,
                    record.file_path,
                    record.file_mtime,
                    now
                ],
            )?;
        }
        EntityKind::Feature => {
            conn.execute(
                "INSERT INTO features (epic_id, key, title, description, status, file_path, file_mtime, created_at, updated_at)
                 VALUES ((SELECT id FROM epics WHERE key = ?1), ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                rusqlite::params![
                    record.parent_key,
                    record.key,
                    record.title,
                    record.description,
                    record.status,
                    record.file_path,
                    record.file_mtime,
                    now
                ],
            )?;
        }
        EntityKind::Task => {
            conn.execute(
                "INSERT INTO tasks (feature_id, key, title, description, status, priority, assigned_agent,
                                    file_path, file_mtime, created_at, updated_at)
                 VALUES ((SELECT id FROM features WHERE key = ?1), ?2, ?3, ?4, ?5, COALESCE(?6, 5), ?7, ?8, ?9, ?10, ?10)",
                rusqlite::params![
                    record.parent_key,
                    record.key,
                    record.title,
                    record.description,
                    record.status,
                    record.priority,
                    record.assigned_agent,
                    record.file_path,
                    record.file_mtime,
                    now
                ],
            )?;
        }
    }
    Ok(conn.last_insert_rowid())
}

/// Apply column changes to an existing row.
///
/// `updated_at` is set to `now` only when the update changes content; a
/// `file_mtime`-only update leaves it alone.
///
/// # Errors
///
/// Returns `Error::EntityNotFound` if no row has `key`, or a database error.
pub fn update_record(conn: &Connection, kind: EntityKind, key: &str, update: &RecordUpdate, now: i64) -> Result<()> {
    if update.is_empty() {
        return Ok(());
    }

    // Build dynamic UPDATE query based on provided fields
    let mut set_clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(t) = &update.title {
        set_clauses.push("title = ?");
        params.push(Box::new(t.clone()));
    }
    if let Some(d) = &update.description {
        set_clauses.push("description = ?");
        params.push(Box::new(d.clone()));
    }
    if let Some(s) = &update.status {
        set_clauses.push("status = ?");
        params.push(Box::new(s.clone()));
    }
    if let Some(p) = &update.file_path {
        set_clauses.push("file_path = ?");
        params.push(Box::new(p.clone()));
    }
    if let Some(m) = update.file_mtime {
        set_clauses.push("file_mtime = ?");
        params.push(Box::new(m));
    }
    if update.changes_content() {
        set_clauses.push("updated_at = ?");
        params.push(Box::new(now));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE key = ?",
        kind.table(),
        set_clauses.join(", ")
    );
    params.push(Box::new(key.to_string()));

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(AsRef::as_ref).collect();
    let rows = conn.execute(&sql, param_refs.as_slice())?;

    if rows == 0 {
        return Err(Error::EntityNotFound {
            kind: kind.as_str(),
            key: key.to_string(),
        });
    }
    Ok(())
}

// ==================
// Row mapping
// ==================

const EPIC_SELECT: &str = "SELECT e.id, e.key, e.title, e.description, e.status, e.file_path, e.file_mtime,
        e.created_at, e.updated_at
 FROM epics e";

const FEATURE_SELECT: &str = "SELECT f.id, e.key, f.key, f.title, f.description, f.status, f.file_path,
        f.file_mtime, f.created_at, f.updated_at
 FROM features f JOIN epics e ON e.id = f.epic_id";

const TASK_SELECT: &str = "SELECT t.id, f.key, t.key, t.title, t.description, t.status, t.priority,
        t.assigned_agent, t.file_path, t.file_mtime, t.created_at, t.updated_at
 FROM tasks t
 JOIN features f ON f.id = t.feature_id
 JOIN epics e ON e.id = f.epic_id";

fn map_epic(row: &Row<'_>) -> rusqlite::Result<Epic> {
    Ok(Epic {
        id: row.get(0)?,
        key: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        file_path: row.get(5)?,
        file_mtime: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn map_feature(row: &Row<'_>) -> rusqlite::Result<Feature> {
    Ok(Feature {
        id: row.get(0)?,
        epic_key: row.get(1)?,
        key: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        file_path: row.get(6)?,
        file_mtime: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn map_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        feature_key: row.get(1)?,
        key: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        priority: row.get(6)?,
        assigned_agent: row.get(7)?,
        file_path: row.get(8)?,
        file_mtime: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}
