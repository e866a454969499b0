//! Command implementations.

pub mod completions;
pub mod discover;
pub mod epic;
pub mod feature;
pub mod init;
pub mod sync;
pub mod task;
pub mod version;
pub mod workflow;

use std::path::{Path, PathBuf};

use crate::config::{project_root, resolve_db_path, ProjectConfig};
use crate::error::{Error, Result};
use crate::patterns::PatternMatcher;
use crate::storage::{get_or_open, SharedStorage};
use crate::workflow::WorkflowGraph;

/// The project an invocation works on: its root and loaded config.
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    /// Discover the project root and load `.planbook.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let root = project_root()?;
        let config = ProjectConfig::load(&root)?;
        tracing::debug!(root = %root.display(), "Loaded project");
        Ok(Self { root, config })
    }

    /// Compile the configured naming patterns.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an invalid pattern.
    pub fn matcher(&self) -> Result<PatternMatcher> {
        PatternMatcher::new(&self.config.pattern_config())
    }

    /// The configured workflow graph, or the default.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidWorkflow` for a malformed `status_flow`.
    pub fn workflow(&self) -> Result<WorkflowGraph> {
        WorkflowGraph::load(self.config.workflow_config())
    }

    /// Docs root, honoring a `--folder` override.
    #[must_use]
    pub fn docs_root(&self, folder: Option<&Path>) -> PathBuf {
        self.config.docs_root(&self.root, folder)
    }

    #[must_use]
    pub fn db_path(&self, explicit: Option<&PathBuf>) -> PathBuf {
        resolve_db_path(explicit.map(PathBuf::as_path), &self.root, &self.config)
    }

    /// Open the project database.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotInitialized` if the database file does not exist.
    pub fn open_storage(&self, explicit: Option<&PathBuf>) -> Result<SharedStorage> {
        let db_path = self.db_path(explicit);
        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }
        get_or_open(&db_path)
    }
}

/// Print a value as one line of JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
