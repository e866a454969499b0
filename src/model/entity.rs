//! Epic, feature and task rows.
//!
//! Timestamps are stored as INTEGER Unix milliseconds.

use serde::{Deserialize, Serialize};

/// The three levels of the work breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Epic,
    Feature,
    Task,
}

impl EntityKind {
    /// Get the string representation for storage and reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Feature => "feature",
            Self::Task => "task",
        }
    }

    /// Table holding rows of this kind.
    #[must_use]
    pub const fn table(&self) -> &'static str {
        match self {
            Self::Epic => "epics",
            Self::Feature => "features",
            Self::Task => "tasks",
        }
    }

    /// Fields compared during conflict detection.
    ///
    /// Only fields the markdown format carries are listed; `file_path`
    /// always follows the file and is never a conflict.
    #[must_use]
    pub const fn tracked_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Epic | Self::Feature => &["title", "description"],
            Self::Task => &["title", "description", "status"],
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An epic row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    pub id: i64,
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub file_path: Option<String>,
    pub file_mtime: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A feature row, joined with its epic key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub id: i64,
    pub epic_key: String,
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub file_path: Option<String>,
    pub file_mtime: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task row, joined with its feature key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub feature_key: String,
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: i32,
    pub assigned_agent: Option<String>,
    pub file_path: Option<String>,
    pub file_mtime: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The columns every entity table shares.
///
/// This is the shape the sync engine loads for conflict detection,
/// regardless of kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub id: i64,
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub file_path: Option<String>,
    pub file_mtime: Option<i64>,
    pub updated_at: i64,
}

impl EntityRecord {
    /// Current value of a tracked field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(self.title.as_str()),
            "description" => self.description.as_deref(),
            "status" => Some(self.status.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_fields_per_kind() {
        assert_eq!(EntityKind::Task.tracked_fields(), &["title", "description", "status"]);
        assert!(!EntityKind::Epic.tracked_fields().contains(&"status"));
        assert!(!EntityKind::Feature.tracked_fields().contains(&"file_path"));
    }

    #[test]
    fn test_record_field_lookup() {
        let record = EntityRecord {
            kind: EntityKind::Task,
            id: 1,
            key: "T-E01-F01-001".to_string(),
            title: "Setup".to_string(),
            description: None,
            status: "todo".to_string(),
            file_path: None,
            file_mtime: None,
            updated_at: 0,
        };
        assert_eq!(record.field("title"), Some("Setup"));
        assert_eq!(record.field("description"), None);
        assert_eq!(record.field("status"), Some("todo"));
        assert_eq!(record.field("priority"), None);
    }
}
