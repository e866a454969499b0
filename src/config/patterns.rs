//! Naming pattern configuration.
//!
//! Each entity kind has an ordered list of folder patterns and file
//! patterns. Patterns are regular expressions with named capture groups;
//! the first pattern that matches wins.
//!
//! Recognized capture names:
//! - `epic_id`, `epic_num`, `epic_slug`
//! - `feature_id`, `feature_num`, `feature_slug`
//! - `task_key`, `task_num`, `task_slug`
//! - `number`, `slug` (meaning depends on the kind being matched)

use serde::{Deserialize, Serialize};

/// Capture group names the matcher understands.
pub const RECOGNIZED_GROUPS: &[&str] = &[
    "epic_id",
    "epic_num",
    "epic_slug",
    "feature_id",
    "feature_num",
    "feature_slug",
    "task_key",
    "task_num",
    "task_slug",
    "number",
    "slug",
];

/// Folder and file patterns for one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPatterns {
    #[serde(default)]
    pub folder: Vec<String>,
    #[serde(default)]
    pub file: Vec<String>,
}

/// Effective patterns for all three kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub epic: EntityPatterns,
    pub feature: EntityPatterns,
    pub task: EntityPatterns,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            epic: EntityPatterns {
                folder: vec![r"^E(?P<number>\d{2})-(?P<slug>[a-z0-9-]+)$".to_string()],
                file: vec![r"^epic\.md$".to_string()],
            },
            feature: EntityPatterns {
                folder: vec![
                    // Direct child of an epic: E01-F02-slug
                    r"^E(?P<epic_num>\d{2})-F(?P<number>\d{2})-(?P<slug>[a-z0-9-]+)$".to_string(),
                    // Nested under organizational folders: F02-slug
                    r"^F(?P<number>\d{2})-(?P<slug>[a-z0-9-]+)$".to_string(),
                ],
                file: vec![
                    r"^prd\.md$".to_string(),
                    r"^PRD_F(?P<number>\d{2})-(?P<slug>.+)\.md$".to_string(),
                    r"^(?P<slug>[a-z0-9-]+)\.md$".to_string(),
                ],
            },
            task: EntityPatterns {
                folder: Vec::new(),
                file: vec![
                    r"^T-E(?P<epic_num>\d{2})-F(?P<feature_num>\d{2})-(?P<number>\d{3}).*\.md$"
                        .to_string(),
                    r"^(?P<number>\d{3})-(?P<slug>.+)\.md$".to_string(),
                    r"^(?P<slug>.+)\.prp\.md$".to_string(),
                ],
            },
        }
    }
}

/// Per-list overrides as written in `.planbook.json`.
///
/// A list that is present replaces the built-in list for that slot
/// entirely; lists are never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternOverrides {
    #[serde(default, skip_serializing_if = "KindOverrides::is_empty")]
    pub epic: KindOverrides,
    #[serde(default, skip_serializing_if = "KindOverrides::is_empty")]
    pub feature: KindOverrides,
    #[serde(default, skip_serializing_if = "KindOverrides::is_empty")]
    pub task: KindOverrides,
}

/// Optional folder/file lists for one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Vec<String>>,
}

impl KindOverrides {
    fn is_empty(&self) -> bool {
        self.folder.is_none() && self.file.is_none()
    }

    fn apply(&self, base: EntityPatterns) -> EntityPatterns {
        EntityPatterns {
            folder: self.folder.clone().unwrap_or(base.folder),
            file: self.file.clone().unwrap_or(base.file),
        }
    }
}

impl PatternConfig {
    /// Built-in defaults with any configured lists substituted in.
    #[must_use]
    pub fn with_overrides(overrides: Option<&PatternOverrides>) -> Self {
        let defaults = Self::default();
        match overrides {
            None => defaults,
            Some(o) => Self {
                epic: o.epic.apply(defaults.epic),
                feature: o.feature.apply(defaults.feature),
                task: o.task.apply(defaults.task),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_present() {
        let config = PatternConfig::default();
        assert_eq!(config.epic.folder.len(), 1);
        assert_eq!(config.feature.folder.len(), 2);
        assert_eq!(config.task.file.len(), 3);
        assert!(config.task.folder.is_empty());
    }

    #[test]
    fn test_override_replaces_list_without_merging() {
        let overrides: PatternOverrides = serde_json::from_str(
            r#"{"feature": {"folder": ["^feat-(?P<number>\\d{2})$"]}}"#,
        )
        .unwrap();

        let config = PatternConfig::with_overrides(Some(&overrides));
        assert_eq!(config.feature.folder, vec![r"^feat-(?P<number>\d{2})$".to_string()]);
        // Untouched slots keep their defaults
        assert_eq!(config.feature.file, PatternConfig::default().feature.file);
        assert_eq!(config.epic, PatternConfig::default().epic);
    }

    #[test]
    fn test_empty_override_list_is_respected() {
        let overrides: PatternOverrides =
            serde_json::from_str(r#"{"feature": {"file": []}}"#).unwrap();
        let config = PatternConfig::with_overrides(Some(&overrides));
        assert!(config.feature.file.is_empty());
    }
}
