//! Conflict detection.
//!
//! A field is in conflict when its file and database values differ and
//! both sides changed since the checkpoint. Only fields the file carries
//! are compared (see [`EntityKind::tracked_fields`]); a field the file
//! omits never conflicts and is never overwritten.
//!
//! [`EntityKind::tracked_fields`]: crate::model::EntityKind::tracked_fields

use crate::model::EntityRecord;
use crate::sync::types::ChangeCandidate;

/// A tracked field whose values differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    pub field: &'static str,
    pub file_value: String,
    pub db_value: Option<String>,
}

/// Comparison of one candidate with its stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub diffs: Vec<FieldDiff>,
    /// File mtime is after the checkpoint.
    pub file_changed: bool,
    /// Row `updated_at` is after the checkpoint.
    pub db_changed: bool,
}

impl Detection {
    /// Both sides changed and at least one field differs.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.file_changed && self.db_changed && !self.diffs.is_empty()
    }
}

/// Compare a candidate with its row.
///
/// With no checkpoint both sides count as changed.
#[must_use]
pub fn detect(candidate: &ChangeCandidate, record: &EntityRecord, checkpoint: Option<i64>) -> Detection {
    Detection {
        diffs: diff_fields(candidate, record),
        file_changed: checkpoint.is_none_or(|t0| candidate.mtime > t0),
        db_changed: checkpoint.is_none_or(|t0| record.updated_at > t0),
    }
}

/// Tracked fields present in the file whose values differ from the row.
///
/// A missing database description compares equal to an empty one.
#[must_use]
pub fn diff_fields(candidate: &ChangeCandidate, record: &EntityRecord) -> Vec<FieldDiff> {
    candidate
        .kind
        .tracked_fields()
        .iter()
        .filter_map(|&field| {
            let file_value = candidate.field(field)?;
            let db_value = record.field(field);
            (db_value.unwrap_or_default() != file_value).then(|| FieldDiff {
                field,
                file_value: file_value.to_string(),
                db_value: db_value.map(str::to_string),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;
    use std::collections::BTreeMap;

    fn candidate(mtime: i64, fields: &[(&'static str, &str)]) -> ChangeCandidate {
        ChangeCandidate {
            kind: EntityKind::Task,
            key: "T-E01-F01-001".to_string(),
            parent_key: Some("E01-F01".to_string()),
            file_path: "docs/plan/t.md".to_string(),
            mtime,
            is_file: true,
            fields: fields
                .iter()
                .map(|(k, v)| (*k, (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
            fallback_title: "T".to_string(),
            priority: None,
            assigned_agent: None,
        }
    }

    fn record(updated_at: i64) -> EntityRecord {
        EntityRecord {
            kind: EntityKind::Task,
            id: 1,
            key: "T-E01-F01-001".to_string(),
            title: "Old title".to_string(),
            description: None,
            status: "todo".to_string(),
            file_path: Some("docs/plan/t.md".to_string()),
            file_mtime: Some(0),
            updated_at,
        }
    }

    #[test]
    fn test_conflict_requires_both_sides_and_a_difference() {
        let differs = [("title", "New title")];
        let same = [("title", "Old title")];
        let t0 = Some(100);

        // (file changed, db changed, differs) -> conflict
        let cases = [
            (200, 200, &differs[..], true),
            (200, 50, &differs[..], false),
            (50, 200, &differs[..], false),
            (50, 50, &differs[..], false),
            (200, 200, &same[..], false),
        ];
        for (mtime, updated_at, fields, expected) in cases {
            let detection = detect(&candidate(mtime, fields), &record(updated_at), t0);
            assert_eq!(
                detection.is_conflict(),
                expected,
                "mtime={mtime} updated_at={updated_at} fields={fields:?}"
            );
        }
    }

    #[test]
    fn test_no_checkpoint_means_both_changed() {
        let detection = detect(&candidate(1, &[("status", "in_progress")]), &record(1), None);
        assert!(detection.file_changed && detection.db_changed);
        assert!(detection.is_conflict());
    }

    #[test]
    fn test_fields_absent_from_file_are_ignored() {
        let diffs = diff_fields(&candidate(0, &[]), &record(0));
        assert!(diffs.is_empty());

        let diffs = diff_fields(&candidate(0, &[("description", "")]), &record(0));
        assert!(diffs.is_empty(), "empty description equals a missing one");
    }

    #[test]
    fn test_epic_status_is_not_tracked() {
        let mut c = candidate(0, &[("status", "completed"), ("title", "Old title")]);
        c.kind = EntityKind::Epic;
        let mut r = record(0);
        r.kind = EntityKind::Epic;
        assert!(diff_fields(&c, &r).is_empty());
    }

    #[test]
    fn test_diff_reports_both_values() {
        let diffs = diff_fields(
            &candidate(0, &[("title", "New title"), ("status", "todo")]),
            &record(0),
        );
        assert_eq!(
            diffs,
            vec![FieldDiff {
                field: "title",
                file_value: "New title".to_string(),
                db_value: Some("Old title".to_string()),
            }]
        );
    }
}
