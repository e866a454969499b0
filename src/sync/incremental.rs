//! Incremental filtering against the sync checkpoint.
//!
//! A file-backed candidate survives when its mtime is after the
//! checkpoint, or when it has no row yet: a time filter alone can never
//! rule out a file that was never imported. Folder-only candidates carry
//! no fields, so they only matter while their row does not exist.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{EntityKind, EntityRecord};
use crate::storage::SqliteStorage;
use crate::sync::types::{ChangeCandidate, SyncReport};
use crate::validate::feature_epic_key;

/// File mtimes this far ahead of the process clock are still ordinary.
pub const CLOCK_SKEW_TOLERANCE_MS: i64 = 60_000;

/// Stored rows relevant to one sync cycle, by kind and key.
#[derive(Debug, Default)]
pub struct ExistingRecords {
    records: HashMap<EntityKind, HashMap<String, EntityRecord>>,
}

impl ExistingRecords {
    /// Batch-load the rows for every candidate, plus the parents that
    /// candidates refer to.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn load(storage: &SqliteStorage, candidates: &[ChangeCandidate]) -> Result<Self> {
        let mut keys: HashMap<EntityKind, Vec<String>> = HashMap::new();
        for c in candidates {
            keys.entry(c.kind).or_default().push(c.key.clone());
            match (c.kind, c.parent_key.as_deref()) {
                (EntityKind::Task, Some(feature)) => {
                    keys.entry(EntityKind::Feature).or_default().push(feature.to_string());
                    if let Some(epic) = feature_epic_key(feature) {
                        keys.entry(EntityKind::Epic).or_default().push(epic.to_string());
                    }
                }
                (EntityKind::Feature, Some(epic)) => {
                    keys.entry(EntityKind::Epic).or_default().push(epic.to_string());
                }
                _ => {}
            }
        }

        let mut existing = Self::default();
        for (kind, mut keys) in keys {
            keys.sort_unstable();
            keys.dedup();
            let rows = storage.get_records(kind, &keys)?;
            debug!(kind = %kind, requested = keys.len(), found = rows.len(), "Loaded existing rows");
            existing.records.insert(kind, rows);
        }
        Ok(existing)
    }

    #[must_use]
    pub fn get(&self, kind: EntityKind, key: &str) -> Option<&EntityRecord> {
        self.records.get(&kind).and_then(|rows| rows.get(key))
    }

    #[must_use]
    pub fn contains(&self, kind: EntityKind, key: &str) -> bool {
        self.get(kind, key).is_some()
    }

    pub fn insert(&mut self, record: EntityRecord) {
        self.records
            .entry(record.kind)
            .or_default()
            .insert(record.key.clone(), record);
    }
}

/// Drop candidates that cannot have changed since `checkpoint`.
///
/// `checkpoint` is `None` for a full scan, which keeps everything. File
/// counters and clock-skew warnings are recorded on `report`.
pub fn filter_changed(
    candidates: Vec<ChangeCandidate>,
    existing: &ExistingRecords,
    checkpoint: Option<i64>,
    now_ms: i64,
    report: &mut SyncReport,
) -> Vec<ChangeCandidate> {
    let mut kept = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let exists = existing.contains(candidate.kind, &candidate.key);

        if candidate.is_file && candidate.mtime > now_ms + CLOCK_SKEW_TOLERANCE_MS {
            warn!(
                path = %candidate.file_path,
                ahead_ms = candidate.mtime - now_ms,
                "File modification time is in the future"
            );
            report.warnings.push(format!(
                "{}: modification time is {}s in the future (clock skew?)",
                candidate.file_path,
                (candidate.mtime - now_ms) / 1000
            ));
        }

        let keep = if !exists {
            true
        } else if !candidate.is_file {
            false
        } else {
            checkpoint.is_none_or(|t0| candidate.mtime > t0)
        };

        if candidate.is_file {
            if keep {
                report.files_changed += 1;
                if !exists {
                    report.new_files += 1;
                }
            } else {
                report.files_skipped += 1;
            }
        }

        if keep {
            kept.push(candidate);
        }
    }

    debug!(
        kept = kept.len(),
        skipped = report.files_skipped,
        incremental = checkpoint.is_some(),
        "Filtered candidates"
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn candidate(key: &str, mtime: i64, is_file: bool) -> ChangeCandidate {
        ChangeCandidate {
            kind: EntityKind::Task,
            key: key.to_string(),
            parent_key: Some("E01-F01".to_string()),
            file_path: format!("docs/{key}.md"),
            mtime,
            is_file,
            fields: BTreeMap::new(),
            fallback_title: key.to_string(),
            priority: None,
            assigned_agent: None,
        }
    }

    fn existing(keys: &[&str]) -> ExistingRecords {
        let mut existing = ExistingRecords::default();
        for key in keys {
            existing.insert(EntityRecord {
                kind: EntityKind::Task,
                id: 1,
                key: (*key).to_string(),
                title: "t".to_string(),
                description: None,
                status: "todo".to_string(),
                file_path: None,
                file_mtime: None,
                updated_at: 0,
            });
        }
        existing
    }

    fn keys(kept: &[ChangeCandidate]) -> Vec<&str> {
        kept.iter().map(|c| c.key.as_str()).collect()
    }

    #[test]
    fn test_old_files_dropped_new_files_kept() {
        let mut report = SyncReport::default();
        let kept = filter_changed(
            vec![
                candidate("T-E01-F01-001", 100, true),
                candidate("T-E01-F01-002", 300, true),
                // Old but never imported
                candidate("T-E01-F01-003", 50, true),
            ],
            &existing(&["T-E01-F01-001", "T-E01-F01-002"]),
            Some(200),
            1_000,
            &mut report,
        );

        assert_eq!(keys(&kept), vec!["T-E01-F01-002", "T-E01-F01-003"]);
        assert_eq!(report.files_changed, 2);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.new_files, 1);
    }

    #[test]
    fn test_mtime_equal_to_checkpoint_is_unchanged() {
        let mut report = SyncReport::default();
        let kept = filter_changed(
            vec![candidate("T-E01-F01-001", 200, true)],
            &existing(&["T-E01-F01-001"]),
            Some(200),
            1_000,
            &mut report,
        );
        assert!(kept.is_empty());
    }

    #[test]
    fn test_full_scan_keeps_everything_with_files() {
        let mut report = SyncReport::default();
        let kept = filter_changed(
            vec![candidate("T-E01-F01-001", 1, true), candidate("T-E01-F01-002", 1, false)],
            &existing(&["T-E01-F01-001", "T-E01-F01-002"]),
            None,
            1_000,
            &mut report,
        );
        // The folder-only candidate has nothing to contribute once stored
        assert_eq!(keys(&kept), vec!["T-E01-F01-001"]);
        assert_eq!(report.files_changed, 1);
    }

    #[test]
    fn test_clock_skew_warns_but_keeps() {
        let mut report = SyncReport::default();
        let now = 1_000_000;
        let kept = filter_changed(
            vec![
                candidate("T-E01-F01-001", now + CLOCK_SKEW_TOLERANCE_MS, true),
                candidate("T-E01-F01-002", now + 5 * CLOCK_SKEW_TOLERANCE_MS, true),
            ],
            &existing(&["T-E01-F01-001", "T-E01-F01-002"]),
            Some(now - 10),
            now,
            &mut report,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("T-E01-F01-002"));
    }
}
