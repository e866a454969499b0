//! Status workflow graph and transition validation.
//!
//! Statuses are not a closed enum: the set of statuses and the legal
//! transitions between them come from configuration (`status_flow` in
//! `.planbook.json`), with a built-in default:
//!
//! ```text
//! todo -> in_progress -> ready_for_review -> completed
//!   |         |  ^             |
//!   v         v  |             |
//!   blocked --+  +-------------+
//! ```
//!
//! A [`WorkflowGraph`] is built once per invocation and only read after
//! that; every query is a pure function of the graph and its inputs.

mod check;

pub use check::validate_workflow;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::validate::normalize_status;

/// Special status key naming the legal initial statuses.
pub const START_KEY: &str = "_start_";

/// Special status key naming the terminal statuses.
pub const COMPLETE_KEY: &str = "_complete_";

/// Display metadata for a status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// Workflow section of the project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub status_flow: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub special_statuses: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub status_metadata: BTreeMap<String, StatusMetadata>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let flow = [
            ("todo", vec!["in_progress", "blocked"]),
            ("in_progress", vec!["ready_for_review", "blocked"]),
            ("ready_for_review", vec!["completed", "in_progress"]),
            ("completed", vec![]),
            ("blocked", vec!["todo", "in_progress"]),
        ];
        let metadata = [
            ("todo", "gray", "Ready to be started", "planning"),
            ("in_progress", "blue", "Actively being worked on", "development"),
            ("ready_for_review", "yellow", "Awaiting review", "review"),
            ("completed", "green", "Reviewed and done", "done"),
            ("blocked", "red", "Blocked by an external dependency", "blocked"),
        ];

        Self {
            status_flow: flow
                .into_iter()
                .map(|(s, next)| (s.to_string(), next.into_iter().map(String::from).collect()))
                .collect(),
            special_statuses: [
                (START_KEY.to_string(), vec!["todo".to_string()]),
                (COMPLETE_KEY.to_string(), vec!["completed".to_string()]),
            ]
            .into_iter()
            .collect(),
            status_metadata: metadata
                .into_iter()
                .map(|(s, color, description, phase)| {
                    (
                        s.to_string(),
                        StatusMetadata {
                            color: Some(color.to_string()),
                            description: Some(description.to_string()),
                            phase: Some(phase.to_string()),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// A validated status graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowGraph {
    flow: BTreeMap<String, Vec<String>>,
    start: Vec<String>,
    complete: Vec<String>,
    metadata: BTreeMap<String, StatusMetadata>,
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::build(WorkflowConfig::default())
    }
}

impl WorkflowGraph {
    /// Build a graph from configuration, validating its structure.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidWorkflow` if the configuration fails any
    /// structural rule (see [`validate_workflow`]).
    pub fn from_config(config: WorkflowConfig) -> Result<Self> {
        validate_workflow(&config)?;
        Ok(Self::build(config))
    }

    /// The configured graph, or the built-in default when none is configured.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidWorkflow` if a configured graph is malformed.
    pub fn load(config: Option<WorkflowConfig>) -> Result<Self> {
        match config {
            Some(c) => Self::from_config(c),
            None => Ok(Self::default()),
        }
    }

    fn build(mut config: WorkflowConfig) -> Self {
        let start = config.special_statuses.remove(START_KEY).unwrap_or_default();
        let complete = config.special_statuses.remove(COMPLETE_KEY).unwrap_or_default();
        Self {
            flow: config.status_flow,
            start,
            complete,
            metadata: config.status_metadata,
        }
    }

    /// Whether `status` is a node of the graph.
    #[must_use]
    pub fn is_valid_status(&self, status: &str) -> bool {
        self.flow.contains_key(status)
    }

    /// Whether `from -> to` is a single legal step.
    ///
    /// Self-transitions are never legal.
    #[must_use]
    pub fn can_transition(&self, from: &str, to: &str) -> bool {
        from != to && self.next_statuses(from).iter().any(|s| s == to)
    }

    /// Validate a transition, explaining why it is rejected.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownStatus` if `from` is not in the graph
    /// - `Error::UnknownTargetStatus` if `to` is not in the graph
    /// - `Error::SelfTransition` if `from == to`
    /// - `Error::InvalidTransition` if `to` is not a successor of `from`
    pub fn validate_transition(&self, from: &str, to: &str) -> Result<()> {
        let Some(allowed) = self.flow.get(from) else {
            return Err(Error::UnknownStatus {
                status: from.to_string(),
                valid: self.statuses(),
            });
        };

        if !self.is_valid_status(to) {
            return Err(Error::UnknownTargetStatus {
                status: to.to_string(),
                valid: self.statuses(),
            });
        }

        if from == to {
            return Err(Error::SelfTransition { status: from.to_string() });
        }

        if allowed.iter().any(|s| s == to) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
                allowed: allowed.clone(),
            })
        }
    }

    /// Successors of `status` (empty for unknown or terminal statuses).
    #[must_use]
    pub fn next_statuses(&self, status: &str) -> &[String] {
        self.flow.get(status).map(Vec::as_slice).unwrap_or_default()
    }

    /// Legal initial statuses.
    #[must_use]
    pub fn start_statuses(&self) -> &[String] {
        &self.start
    }

    /// Terminal statuses.
    #[must_use]
    pub fn complete_statuses(&self) -> &[String] {
        &self.complete
    }

    #[must_use]
    pub fn is_complete(&self, status: &str) -> bool {
        self.complete.iter().any(|s| s == status)
    }

    /// Status given to new entities that don't specify one.
    #[must_use]
    pub fn default_status(&self) -> &str {
        self.start.first().map_or("todo", String::as_str)
    }

    #[must_use]
    pub fn metadata(&self, status: &str) -> Option<&StatusMetadata> {
        self.metadata.get(status)
    }

    /// All statuses in workflow order: breadth-first from the start
    /// statuses, then anything left over alphabetically.
    #[must_use]
    pub fn statuses(&self) -> Vec<String> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut ordered = Vec::with_capacity(self.flow.len());
        let mut queue: VecDeque<&str> = self.start.iter().map(String::as_str).collect();

        while let Some(current) = queue.pop_front() {
            if !self.flow.contains_key(current) || !seen.insert(current) {
                continue;
            }
            ordered.push(current.to_string());
            queue.extend(self.next_statuses(current).iter().map(String::as_str));
        }

        for status in self.flow.keys() {
            if !seen.contains(status.as_str()) {
                ordered.push(status.clone());
            }
        }
        ordered
    }

    /// Normalize user or file input to a status of this graph.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownTargetStatus` if the input matches no status,
    /// even after case/separator folding and synonym lookup.
    pub fn normalize(&self, input: &str) -> Result<String> {
        normalize_status(input, self.flow.keys().map(String::as_str)).map_err(|(status, _)| {
            Error::UnknownTargetStatus {
                status,
                valid: self.statuses(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_graph() {
        let graph = WorkflowGraph::default();
        assert_eq!(graph.start_statuses(), &["todo".to_string()]);
        assert_eq!(graph.complete_statuses(), &["completed".to_string()]);
        assert_eq!(graph.default_status(), "todo");
        assert!(graph.is_complete("completed"));
        assert_eq!(
            graph.statuses(),
            vec!["todo", "in_progress", "blocked", "ready_for_review", "completed"]
        );
    }

    #[test]
    fn test_can_transition() {
        let graph = WorkflowGraph::default();
        assert!(graph.can_transition("todo", "in_progress"));
        assert!(graph.can_transition("ready_for_review", "in_progress"));
        assert!(!graph.can_transition("todo", "completed"));
        assert!(!graph.can_transition("completed", "todo"));
        assert!(!graph.can_transition("ghost", "todo"));
    }

    #[test]
    fn test_self_transition_rejected_for_every_status() {
        let graph = WorkflowGraph::default();
        for status in graph.statuses() {
            assert!(!graph.can_transition(&status, &status));
            assert!(matches!(
                graph.validate_transition(&status, &status),
                Err(Error::SelfTransition { .. })
            ));
        }
    }

    #[test]
    fn test_self_transition_rejected_even_with_self_loop_edge() {
        let mut config = WorkflowConfig::default();
        config
            .status_flow
            .get_mut("blocked")
            .unwrap()
            .push("blocked".to_string());
        let graph = WorkflowGraph::from_config(config).unwrap();
        assert!(matches!(
            graph.validate_transition("blocked", "blocked"),
            Err(Error::SelfTransition { .. })
        ));
    }

    #[test]
    fn test_validate_transition_error_kinds() {
        let graph = WorkflowGraph::default();

        assert!(graph.validate_transition("todo", "in_progress").is_ok());
        assert!(matches!(
            graph.validate_transition("archived", "todo"),
            Err(Error::UnknownStatus { .. })
        ));
        assert!(matches!(
            graph.validate_transition("todo", "archived"),
            Err(Error::UnknownTargetStatus { .. })
        ));
        match graph.validate_transition("todo", "completed") {
            Err(Error::InvalidTransition { allowed, .. }) => {
                assert_eq!(allowed, vec!["in_progress", "blocked"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_custom_graph_replaces_statuses() {
        let config: WorkflowConfig = serde_json::from_str(
            r#"{
                "status_flow": {"draft": ["published"], "published": []},
                "special_statuses": {"_start_": ["draft"], "_complete_": ["published"]}
            }"#,
        )
        .unwrap();
        let graph = WorkflowGraph::from_config(config).unwrap();

        assert!(graph.is_valid_status("draft"));
        assert!(!graph.is_valid_status("todo"));
        assert_eq!(graph.default_status(), "draft");
        assert!(graph.validate_transition("draft", "published").is_ok());
    }

    #[test]
    fn test_malformed_graph_surfaces_error() {
        let config: WorkflowConfig = serde_json::from_str(
            r#"{"status_flow": {"draft": ["published"], "published": []}}"#,
        )
        .unwrap();
        assert!(matches!(
            WorkflowGraph::load(Some(config)),
            Err(Error::InvalidWorkflow { .. })
        ));
    }

    #[test]
    fn test_normalize() {
        let graph = WorkflowGraph::default();
        assert_eq!(graph.normalize("In-Progress").unwrap(), "in_progress");
        assert_eq!(graph.normalize("done").unwrap(), "completed");
        assert!(matches!(
            graph.normalize("nonsense"),
            Err(Error::UnknownTargetStatus { .. })
        ));
    }
}
