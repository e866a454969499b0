//! Sync engine.
//!
//! One run moves through these steps:
//!
//! ```text
//! load checkpoint -> scan -> filter -> detect -> resolve -> write (one tx) -> checkpoint
//! ```
//!
//! Any write failure rolls the whole transaction back and leaves the
//! checkpoint alone. A dry run stops after resolving. A run that plans no
//! writes opens no transaction and does not move the checkpoint.

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{EntityKind, EntityRecord};
use crate::patterns::PatternMatcher;
use crate::storage::{insert_record, update_record, ChangeSource, NewRecord, RecordUpdate, SqliteStorage};
use crate::sync::checkpoint::{format_checkpoint, load_checkpoint, save_checkpoint};
use crate::sync::conflict::detect;
use crate::sync::incremental::{filter_changed, ExistingRecords};
use crate::sync::resolver::{resolve, ConflictPrompt};
use crate::sync::scanner::CandidateScanner;
use crate::sync::types::{
    ChangeCandidate, ConflictRecord, Resolution, SyncError, SyncOptions, SyncReport,
};
use crate::validate::feature_epic_key;
use crate::workflow::WorkflowGraph;

/// A row to insert, with the file it came from.
#[derive(Debug)]
struct PlannedInsert {
    record: NewRecord,
    file: String,
}

/// Changes to an existing row.
#[derive(Debug)]
struct PlannedUpdate {
    kind: EntityKind,
    key: String,
    file: String,
    old_status: String,
    update: RecordUpdate,
}

#[derive(Debug, Default)]
struct Plan {
    inserts: Vec<PlannedInsert>,
    updates: Vec<PlannedUpdate>,
    inserting: HashSet<(EntityKind, String)>,
}

impl Plan {
    fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }

    fn insert(&mut self, record: NewRecord, file: String) {
        self.inserting.insert((record.kind, record.key.clone()));
        self.inserts.push(PlannedInsert { record, file });
    }
}

/// Reconciles the markdown tree with the database.
pub struct SyncEngine<'a> {
    storage: &'a mut SqliteStorage,
    matcher: &'a PatternMatcher,
    workflow: &'a WorkflowGraph,
    prompt: Option<Box<dyn ConflictPrompt + 'a>>,
}

impl<'a> SyncEngine<'a> {
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage, matcher: &'a PatternMatcher, workflow: &'a WorkflowGraph) -> Self {
        Self {
            storage,
            matcher,
            workflow,
            prompt: None,
        }
    }

    /// Supply the decision source for the manual strategy.
    #[must_use]
    pub fn with_prompt(mut self, prompt: Box<dyn ConflictPrompt + 'a>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Run one sync cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the docs root is missing, the database cannot
    /// be read, any write fails (nothing is committed), or the checkpoint
    /// cannot be saved after a commit.
    pub fn run(&mut self, options: &SyncOptions) -> Result<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport {
            dry_run: options.dry_run,
            strategy: options.strategy,
            ..SyncReport::default()
        };

        let t0 = load_checkpoint(&options.project_root, &mut report.warnings)?;
        let tnow = now();
        let t0_ms = t0.map(|t| t.timestamp_millis());
        let tnow_ms = tnow.timestamp_millis();
        report.checkpoint = t0.map(format_checkpoint);
        debug!(checkpoint = ?report.checkpoint, full = options.force_full_scan, "Starting sync");

        let scanned = CandidateScanner::new(self.matcher, self.workflow, &options.project_root)
            .scan(&options.docs_root)?;
        report.files_scanned = scanned.files_scanned;
        report.warnings.extend(scanned.warnings);

        let existing = ExistingRecords::load(&*self.storage, &scanned.candidates)?;
        let filter_at = if options.force_full_scan { None } else { t0_ms };
        let kept = filter_changed(scanned.candidates, &existing, filter_at, tnow_ms, &mut report);

        let plan = self.plan(kept, &existing, t0_ms, options, &mut report)?;

        if options.dry_run {
            for update in &plan.updates {
                if let Some(status) = &update.update.status {
                    if let Err(e) = self.workflow.validate_transition(&update.old_status, status) {
                        report
                            .errors
                            .push(format!("{} {} ({}): {e}", update.kind, update.key, update.file));
                    }
                }
            }
            report.elapsed_ms = elapsed_ms(started);
            info!(dry_run = true, files = report.files_changed, "Sync preview complete");
            return Ok(report);
        }

        if plan.is_empty() {
            report.elapsed_ms = elapsed_ms(started);
            info!(files = report.files_scanned, "No changes");
            return Ok(report);
        }

        self.apply(&plan, &options.actor, tnow_ms)?;

        let next = match t0 {
            Some(t0) if t0 > tnow => {
                warn!(previous = %format_checkpoint(t0), now = %format_checkpoint(tnow), "Clock is behind the last checkpoint; keeping it");
                report.warnings.push(format!(
                    "system clock is behind the previous checkpoint {}; checkpoint not moved back",
                    format_checkpoint(t0)
                ));
                t0
            }
            _ => tnow,
        };
        save_checkpoint(&options.project_root, next)?;
        report.checkpoint_advanced = true;
        report.checkpoint = Some(format_checkpoint(next));

        report.elapsed_ms = elapsed_ms(started);
        info!(
            created = report.created.total(),
            updated = report.updated.total(),
            conflicts = report.conflicts_detected,
            elapsed_ms = report.elapsed_ms,
            "Sync complete"
        );
        Ok(report)
    }

    /// Decide every write, resolving conflicts along the way.
    fn plan(
        &mut self,
        kept: Vec<ChangeCandidate>,
        existing: &ExistingRecords,
        checkpoint: Option<i64>,
        options: &SyncOptions,
        report: &mut SyncReport,
    ) -> Result<Plan> {
        let mut plan = Plan::default();

        for candidate in kept {
            match existing.get(candidate.kind, &candidate.key) {
                None => {
                    if !self.ensure_parent(&candidate, existing, options.create_missing, &mut plan, report) {
                        continue;
                    }
                    let record = self.new_record(&candidate);
                    debug!(kind = %candidate.kind, key = %candidate.key, "Planned insert");
                    report.created.add(candidate.kind);
                    plan.insert(record, candidate.file_path);
                }
                Some(record) => {
                    let update = self.reconcile(&candidate, record, checkpoint, options, report)?;
                    if update.changes_content() {
                        report.updated.add(candidate.kind);
                    } else {
                        report.unchanged += 1;
                    }
                    if !update.is_empty() {
                        plan.updates.push(PlannedUpdate {
                            kind: candidate.kind,
                            key: candidate.key,
                            file: candidate.file_path,
                            old_status: record.status.clone(),
                            update,
                        });
                    }
                }
            }
        }

        Ok(plan)
    }

    /// Changes for a candidate whose row exists.
    fn reconcile(
        &mut self,
        candidate: &ChangeCandidate,
        record: &EntityRecord,
        checkpoint: Option<i64>,
        options: &SyncOptions,
        report: &mut SyncReport,
    ) -> Result<RecordUpdate> {
        let detection = detect(candidate, record, checkpoint);
        let mut update = RecordUpdate::default();

        if detection.is_conflict() {
            for diff in detection.diffs {
                let mut conflict = ConflictRecord {
                    key: candidate.key.clone(),
                    kind: candidate.kind,
                    file_path: candidate.file_path.clone(),
                    field: diff.field.to_string(),
                    file_value: diff.file_value,
                    db_value: diff.db_value,
                    file_mtime: candidate.mtime,
                    db_updated_at: record.updated_at,
                    resolution: None,
                    strategy: options.strategy,
                };
                let resolution = resolve(options.strategy, &conflict, self.prompt.as_deref_mut())?;
                debug!(key = %conflict.key, field = %conflict.field, resolution = resolution.as_str(), "Resolved conflict");

                report.conflicts_detected += 1;
                if resolution != Resolution::Skipped {
                    report.conflicts_resolved += 1;
                }
                if resolution == Resolution::File {
                    set_field(&mut update, diff.field, conflict.file_value.clone());
                }
                conflict.resolution = Some(resolution);
                report.conflicts.push(conflict);
            }
        } else if detection.file_changed {
            for diff in detection.diffs {
                set_field(&mut update, diff.field, diff.file_value);
            }
        }

        if record.file_path.as_deref() != Some(candidate.file_path.as_str()) {
            update.file_path = Some(candidate.file_path.clone());
        }
        if candidate.is_file && record.file_mtime != Some(candidate.mtime) {
            update.file_mtime = Some(candidate.mtime);
        }
        Ok(update)
    }

    /// Make sure the parent of a new row exists or is being inserted.
    ///
    /// With `create_missing` placeholder parents are planned; otherwise the
    /// candidate is excluded with a warning.
    fn ensure_parent(
        &self,
        candidate: &ChangeCandidate,
        existing: &ExistingRecords,
        create_missing: bool,
        plan: &mut Plan,
        report: &mut SyncReport,
    ) -> bool {
        let parent_kind = match candidate.kind {
            EntityKind::Epic => return true,
            EntityKind::Feature => EntityKind::Epic,
            EntityKind::Task => EntityKind::Feature,
        };
        let Some(parent_key) = candidate.parent_key.as_deref() else {
            return true;
        };

        let present = |kind: EntityKind, key: &str, plan: &Plan| {
            existing.contains(kind, key) || plan.inserting.contains(&(kind, key.to_string()))
        };
        if present(parent_kind, parent_key, &*plan) {
            return true;
        }

        if !create_missing {
            warn!(key = %candidate.key, parent = parent_key, "Parent does not exist; skipping");
            report.warnings.push(format!(
                "{}: {parent_kind} {parent_key} for {} {} does not exist (pass --create-missing to create it)",
                candidate.file_path, candidate.kind, candidate.key
            ));
            return false;
        }

        let epic_key = match parent_kind {
            EntityKind::Feature => feature_epic_key(parent_key),
            _ => Some(parent_key),
        };
        let Some(epic_key) = epic_key else {
            return false;
        };

        if !present(EntityKind::Epic, epic_key, &*plan) {
            plan.insert(self.placeholder(EntityKind::Epic, epic_key, None), candidate.file_path.clone());
            report.created.add(EntityKind::Epic);
        }
        if parent_kind == EntityKind::Feature {
            plan.insert(
                self.placeholder(EntityKind::Feature, parent_key, Some(epic_key)),
                candidate.file_path.clone(),
            );
            report.created.add(EntityKind::Feature);
        }
        info!(key = %candidate.key, parent = parent_key, "Creating missing parent");
        true
    }

    fn placeholder(&self, kind: EntityKind, key: &str, parent_key: Option<&str>) -> NewRecord {
        NewRecord {
            kind,
            key: key.to_string(),
            parent_key: parent_key.map(str::to_string),
            title: format!("Auto-created {kind} {key}"),
            description: None,
            status: self.workflow.default_status().to_string(),
            priority: None,
            assigned_agent: None,
            file_path: None,
            file_mtime: None,
        }
    }

    fn new_record(&self, candidate: &ChangeCandidate) -> NewRecord {
        NewRecord {
            kind: candidate.kind,
            key: candidate.key.clone(),
            parent_key: candidate.parent_key.clone(),
            title: candidate
                .field("title")
                .unwrap_or(&candidate.fallback_title)
                .to_string(),
            description: candidate.field("description").map(str::to_string),
            status: candidate
                .field("status")
                .unwrap_or_else(|| self.workflow.default_status())
                .to_string(),
            priority: candidate.priority,
            assigned_agent: candidate.assigned_agent.clone(),
            file_path: Some(candidate.file_path.clone()),
            file_mtime: candidate.is_file.then_some(candidate.mtime),
        }
    }

    /// Write the plan in one transaction.
    fn apply(&mut self, plan: &Plan, actor: &str, now_ms: i64) -> Result<()> {
        let workflow = self.workflow;

        self.storage.mutate("sync", actor, |tx, ctx| {
            for insert in &plan.inserts {
                let record = &insert.record;
                insert_record(tx, record, now_ms)
                    .map_err(|e| write_error(record.kind, &record.key, &insert.file, e))?;
                if record.kind == EntityKind::Task {
                    ctx.record_status_change(&record.key, None, &record.status, ChangeSource::Sync, now_ms);
                }
            }

            for planned in &plan.updates {
                if let Some(status) = &planned.update.status {
                    workflow
                        .validate_transition(&planned.old_status, status)
                        .map_err(|e| write_error(planned.kind, &planned.key, &planned.file, e))?;
                }
                update_record(tx, planned.kind, &planned.key, &planned.update, now_ms)
                    .map_err(|e| write_error(planned.kind, &planned.key, &planned.file, e))?;
                if let (EntityKind::Task, Some(status)) = (planned.kind, &planned.update.status) {
                    ctx.record_status_change(
                        &planned.key,
                        Some(planned.old_status.as_str()),
                        status,
                        ChangeSource::Sync,
                        now_ms,
                    );
                }
            }
            Ok(())
        })?;

        debug!(inserts = plan.inserts.len(), updates = plan.updates.len(), "Committed sync");
        Ok(())
    }
}

fn set_field(update: &mut RecordUpdate, field: &str, value: String) {
    match field {
        "title" => update.title = Some(value),
        "description" => update.description = Some(value),
        "status" => update.status = Some(value),
        _ => {}
    }
}

fn write_error(kind: EntityKind, key: &str, file: &str, source: Error) -> Error {
    SyncError::Write {
        kind,
        key: key.to_string(),
        file: file.to_string(),
        source: Box::new(source),
    }
    .into()
}

/// Current time at the millisecond precision rows are stored with.
fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
