//! Configuration management.
//!
//! This module provides functions for discovering the project root,
//! loading `.planbook.json`, and resolving the database and docs paths.
//!
//! # Layout
//!
//! A Planbook project is any directory containing `.planbook.json`:
//! - **Docs root**: markdown tree scanned by sync (default `docs/plan`)
//! - **Database**: SQLite file (default `planbook.db` next to the config)
//! - **Checkpoint**: `last_sync_time` inside the config file itself
//!
//! Unknown keys in the config file are preserved on rewrite so other
//! tools can keep their own settings alongside ours.

pub mod patterns;

pub use patterns::{EntityPatterns, KindOverrides, PatternConfig, PatternOverrides};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::workflow::{StatusMetadata, WorkflowConfig};

/// Config file name, looked up from the working directory upward.
pub const CONFIG_FILE: &str = ".planbook.json";

/// Default docs root, relative to the project root.
pub const DEFAULT_DOCS_ROOT: &str = "docs/plan";

/// Default database file name, relative to the project root.
pub const DEFAULT_DB_FILE: &str = "planbook.db";

/// Contents of `.planbook.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Markdown root scanned by sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_root: Option<String>,

    /// Database path (relative paths resolve against the project root).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Sync checkpoint. Kept raw so a malformed value never fails the load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<PatternOverrides>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_flow: Option<BTreeMap<String, Vec<String>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_statuses: Option<BTreeMap<String, Vec<String>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_metadata: Option<BTreeMap<String, StatusMetadata>>,

    /// Keys we do not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProjectConfig {
    /// Load the config file from `root`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file exists but is not valid JSON
    /// of the expected shape.
    pub fn load(root: &Path) -> Result<Self> {
        let path = config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Effective naming patterns (defaults with configured lists applied).
    #[must_use]
    pub fn pattern_config(&self) -> PatternConfig {
        PatternConfig::with_overrides(self.patterns.as_ref())
    }

    /// Workflow section, or `None` when no `status_flow` is configured.
    #[must_use]
    pub fn workflow_config(&self) -> Option<WorkflowConfig> {
        self.status_flow.as_ref().map(|flow| WorkflowConfig {
            status_flow: flow.clone(),
            special_statuses: self.special_statuses.clone().unwrap_or_default(),
            status_metadata: self.status_metadata.clone().unwrap_or_default(),
        })
    }

    /// Resolve the docs root, honoring an explicit override.
    #[must_use]
    pub fn docs_root(&self, root: &Path, override_path: Option<&Path>) -> PathBuf {
        match override_path {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => root.join(p),
            None => root.join(self.docs_root.as_deref().unwrap_or(DEFAULT_DOCS_ROOT)),
        }
    }
}

/// Path of the config file under `root`.
#[must_use]
pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Walk up from `start` looking for `.planbook.json`.
///
/// Returns the directory containing it, or `None` if no ancestor has one.
#[must_use]
pub fn discover_project_root_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(CONFIG_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Discover the project root from the current directory.
#[must_use]
pub fn discover_project_root() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| discover_project_root_from(&cwd))
}

/// Project root for this invocation.
///
/// The directory holding `.planbook.json`, or the working directory when
/// no ancestor has one.
///
/// # Errors
///
/// Returns an error if the working directory cannot be read.
pub fn project_root() -> Result<PathBuf> {
    match discover_project_root() {
        Some(root) => Ok(root),
        None => Ok(std::env::current_dir()?),
    }
}

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag or `PB_DB` environment variable)
/// 2. `database` from `.planbook.json`, relative to the project root
/// 3. `<root>/planbook.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>, root: &Path, config: &ProjectConfig) -> PathBuf {
    if let Some(path) = explicit_path {
        return path.to_path_buf();
    }

    match config.database.as_deref() {
        Some(db) if !db.trim().is_empty() => {
            let p = Path::new(db);
            if p.is_absolute() { p.to_path_buf() } else { root.join(p) }
        }
        _ => root.join(DEFAULT_DB_FILE),
    }
}

/// Get the default actor name for history rows.
///
/// Priority:
/// 1. `PB_ACTOR` environment variable
/// 2. Git user name
/// 3. System username
/// 4. "unknown"
#[must_use]
pub fn default_actor() -> String {
    if let Ok(actor) = std::env::var("PB_ACTOR") {
        if !actor.is_empty() {
            return actor;
        }
    }

    if let Ok(output) = std::process::Command::new("git")
        .args(["config", "user.name"])
        .output()
    {
        if output.status.success() {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }

    if let Ok(user) = std::env::var("USER") {
        return user;
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_actor() {
        let actor = default_actor();
        assert!(!actor.is_empty());
    }

    #[test]
    fn test_load_missing_config_is_default() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert!(config.last_sync_time.is_none());
        assert!(config.workflow_config().is_none());
        assert_eq!(config.pattern_config(), PatternConfig::default());
    }

    #[test]
    fn test_load_invalid_json_is_config_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(config_path(dir.path()), "{not json").unwrap();
        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_keys_round_trip() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            config_path(dir.path()),
            r#"{"docs_root": "plans", "color_enabled": true}"#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.docs_root.as_deref(), Some("plans"));
        assert_eq!(config.extra.get("color_enabled"), Some(&serde_json::json!(true)));

        let out = serde_json::to_value(&config).unwrap();
        assert_eq!(out["color_enabled"], true);
    }

    #[test]
    fn test_discover_project_root_walks_up() {
        let dir = TempDir::new().unwrap();
        std::fs::write(config_path(dir.path()), "{}").unwrap();
        let nested = dir.path().join("docs").join("plan");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(discover_project_root_from(&nested), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_resolve_db_path_priority() {
        let root = Path::new("/project");
        let mut config = ProjectConfig::default();

        assert_eq!(resolve_db_path(None, root, &config), root.join(DEFAULT_DB_FILE));

        config.database = Some("data/pb.db".to_string());
        assert_eq!(resolve_db_path(None, root, &config), root.join("data/pb.db"));

        let explicit = PathBuf::from("/custom/db.sqlite");
        assert_eq!(resolve_db_path(Some(&explicit), root, &config), explicit);
    }

    #[test]
    fn test_docs_root_override() {
        let root = Path::new("/project");
        let config = ProjectConfig::default();
        assert_eq!(config.docs_root(root, None), root.join("docs/plan"));
        assert_eq!(config.docs_root(root, Some(Path::new("other"))), root.join("other"));
        assert_eq!(config.docs_root(root, Some(Path::new("/abs"))), PathBuf::from("/abs"));
    }
}
