//! Structural validation of a workflow configuration.
//!
//! Rules, checked in order (the first failure is reported):
//! 1. `_start_` and `_complete_` special statuses are defined, non-empty,
//!    and every status they name exists in `status_flow`
//! 2. Every transition target is itself defined in `status_flow`
//! 3. Every status is reachable from some start status
//! 4. Every status can reach some complete status

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{Error, Result};

use super::{WorkflowConfig, COMPLETE_KEY, START_KEY};

/// Validate a workflow configuration.
///
/// # Errors
///
/// Returns `Error::InvalidWorkflow` with a message and a suggested fix.
pub fn validate_workflow(config: &WorkflowConfig) -> Result<()> {
    check_special_statuses(config)?;
    check_references(config)?;
    check_reachable_from_start(config)?;
    check_can_complete(config)?;
    Ok(())
}

fn invalid(message: String, fix: String) -> Error {
    Error::InvalidWorkflow { message, fix }
}

fn check_special_statuses(config: &WorkflowConfig) -> Result<()> {
    for (key, example) in [(START_KEY, "todo"), (COMPLETE_KEY, "completed")] {
        let statuses = config.special_statuses.get(key).map(Vec::as_slice).unwrap_or_default();
        if statuses.is_empty() {
            return Err(invalid(
                format!("missing required special status '{key}'"),
                format!("add 'special_statuses.{key}' with at least one status (e.g. [\"{example}\"])"),
            ));
        }
        for status in statuses {
            if !config.status_flow.contains_key(status) {
                return Err(invalid(
                    format!("{key} status '{status}' is not defined in status_flow"),
                    format!("add '{status}' to status_flow or remove it from {key}"),
                ));
            }
        }
    }
    Ok(())
}

fn check_references(config: &WorkflowConfig) -> Result<()> {
    let undefined: Vec<String> = config
        .status_flow
        .iter()
        .flat_map(|(from, targets)| targets.iter().map(move |to| (from, to)))
        .filter(|(_, to)| !config.status_flow.contains_key(*to))
        .map(|(from, to)| format!("{from} -> {to}"))
        .collect();

    if undefined.is_empty() {
        Ok(())
    } else {
        Err(invalid(
            format!("undefined status references in transitions: {}", undefined.join(", ")),
            "add the missing statuses to status_flow or remove the transitions".to_string(),
        ))
    }
}

/// Breadth-first search over `edges` from `roots`.
fn reach<'a>(roots: &'a [String], edges: &BTreeMap<&'a str, Vec<&'a str>>) -> BTreeSet<&'a str> {
    let mut seen: BTreeSet<&str> = roots.iter().map(String::as_str).collect();
    let mut queue: VecDeque<&str> = seen.iter().copied().collect();

    while let Some(current) = queue.pop_front() {
        for &next in edges.get(current).into_iter().flatten() {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}

fn check_reachable_from_start(config: &WorkflowConfig) -> Result<()> {
    let starts = &config.special_statuses[START_KEY];
    let forward: BTreeMap<&str, Vec<&str>> = config
        .status_flow
        .iter()
        .map(|(from, to)| (from.as_str(), to.iter().map(String::as_str).collect()))
        .collect();

    let reachable = reach(starts, &forward);
    let unreachable: Vec<&str> = config
        .status_flow
        .keys()
        .map(String::as_str)
        .filter(|s| !reachable.contains(s))
        .collect();

    if unreachable.is_empty() {
        Ok(())
    } else {
        Err(invalid(
            format!("unreachable statuses (no path from {START_KEY}): {}", unreachable.join(", ")),
            format!(
                "add transitions so these are reachable from {}, or remove them",
                starts.join(", ")
            ),
        ))
    }
}

fn check_can_complete(config: &WorkflowConfig) -> Result<()> {
    let completes = &config.special_statuses[COMPLETE_KEY];
    let mut reverse: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (from, targets) in &config.status_flow {
        for to in targets {
            reverse.entry(to.as_str()).or_default().push(from.as_str());
        }
    }

    let can_complete = reach(completes, &reverse);
    let dead_ends: Vec<&str> = config
        .status_flow
        .keys()
        .map(String::as_str)
        .filter(|s| !can_complete.contains(s))
        .collect();

    if dead_ends.is_empty() {
        Ok(())
    } else {
        Err(invalid(
            format!("dead-end statuses (no path to {COMPLETE_KEY}): {}", dead_ends.join(", ")),
            format!(
                "add transitions from these statuses toward {}, or remove them",
                completes.join(", ")
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(flow: Vec<(&str, Vec<&str>)>, start: &[&str], complete: &[&str]) -> WorkflowConfig {
        let mut special = BTreeMap::new();
        if !start.is_empty() {
            special.insert(START_KEY.to_string(), start.iter().map(ToString::to_string).collect());
        }
        if !complete.is_empty() {
            special.insert(
                COMPLETE_KEY.to_string(),
                complete.iter().map(ToString::to_string).collect(),
            );
        }
        WorkflowConfig {
            status_flow: flow
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(ToString::to_string).collect()))
                .collect(),
            special_statuses: special,
            status_metadata: BTreeMap::new(),
        }
    }

    fn message(err: Error) -> String {
        match err {
            Error::InvalidWorkflow { message, .. } => message,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_workflow_is_valid() {
        assert!(validate_workflow(&WorkflowConfig::default()).is_ok());
    }

    #[test]
    fn test_missing_start() {
        let c = config(vec![("a", vec![])], &[], &["a"]);
        assert!(message(validate_workflow(&c).unwrap_err()).contains("_start_"));
    }

    #[test]
    fn test_start_status_not_in_flow() {
        let c = config(vec![("a", vec![])], &["x"], &["a"]);
        assert!(message(validate_workflow(&c).unwrap_err()).contains("'x'"));
    }

    #[test]
    fn test_undefined_reference() {
        let c = config(vec![("a", vec!["ghost"])], &["a"], &["a"]);
        assert!(message(validate_workflow(&c).unwrap_err()).contains("a -> ghost"));
    }

    #[test]
    fn test_unreachable_status() {
        let c = config(vec![("a", vec!["b"]), ("b", vec![]), ("orphan", vec!["b"])], &["a"], &["b"]);
        let msg = message(validate_workflow(&c).unwrap_err());
        assert!(msg.contains("unreachable"));
        assert!(msg.contains("orphan"));
    }

    #[test]
    fn test_dead_end_status() {
        let c = config(
            vec![("a", vec!["b", "stuck"]), ("b", vec![]), ("stuck", vec!["stuck"])],
            &["a"],
            &["b"],
        );
        let msg = message(validate_workflow(&c).unwrap_err());
        assert!(msg.contains("dead-end"));
        assert!(msg.contains("stuck"));
    }
}
