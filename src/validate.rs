//! Key format validation and status normalization.
//!
//! Keys are validated against fixed formats so that a typo in a folder
//! or frontmatter never reaches the database:
//!
//! - Epic: `E01`
//! - Feature: `E01-F02`
//! - Task: `T-E01-F02-003`
//!
//! Status strings coming from files or the command line are normalized
//! (case, separators, common synonyms) before being looked up in the
//! workflow graph.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static EPIC_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^E\d{2}$").expect("static regex"));

static FEATURE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(E\d{2})-F\d{2}$").expect("static regex"));

static TASK_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^T-((E\d{2})-F\d{2})-\d{3}$").expect("static regex"));

/// Synonyms for the statuses of the built-in workflow.
///
/// Only applied when the synonym's target exists in the active graph.
pub static STATUS_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("done", "completed"),
        ("complete", "completed"),
        ("finished", "completed"),
        ("wip", "in_progress"),
        ("started", "in_progress"),
        ("active", "in_progress"),
        ("review", "ready_for_review"),
        ("in_review", "ready_for_review"),
        ("new", "todo"),
        ("open", "todo"),
        ("pending", "todo"),
        ("waiting", "blocked"),
    ]
    .into_iter()
    .collect()
});

/// Check that `key` is a well-formed epic key.
///
/// # Errors
///
/// Returns `Error::InvalidKey` if the key does not match `E\d{2}`.
pub fn validate_epic_key(key: &str) -> Result<()> {
    if EPIC_KEY.is_match(key) {
        Ok(())
    } else {
        Err(Error::InvalidKey { kind: "epic", key: key.to_string() })
    }
}

/// Check that `key` is a well-formed feature key.
///
/// # Errors
///
/// Returns `Error::InvalidKey` if the key does not match `E\d{2}-F\d{2}`.
pub fn validate_feature_key(key: &str) -> Result<()> {
    if FEATURE_KEY.is_match(key) {
        Ok(())
    } else {
        Err(Error::InvalidKey { kind: "feature", key: key.to_string() })
    }
}

/// Check that `key` is a well-formed task key.
///
/// # Errors
///
/// Returns `Error::InvalidKey` if the key does not match `T-E\d{2}-F\d{2}-\d{3}`.
pub fn validate_task_key(key: &str) -> Result<()> {
    if TASK_KEY.is_match(key) {
        Ok(())
    } else {
        Err(Error::InvalidKey { kind: "task", key: key.to_string() })
    }
}

/// Epic key embedded in a feature key (`E01-F02` → `E01`).
#[must_use]
pub fn feature_epic_key(feature_key: &str) -> Option<&str> {
    FEATURE_KEY
        .captures(feature_key)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Split a task key into its epic and feature keys.
///
/// `T-E04-F07-001` → `("E04", "E04-F07")`.
#[must_use]
pub fn split_task_key(task_key: &str) -> Option<(&str, &str)> {
    let caps = TASK_KEY.captures(task_key)?;
    Some((caps.get(2)?.as_str(), caps.get(1)?.as_str()))
}

/// Normalize a status string against a set of known statuses.
///
/// Three tiers: exact match after folding case and separators, synonym
/// lookup, then an error carrying the original input and the closest
/// known status (if any is close enough to be a plausible typo).
pub fn normalize_status<'a, I>(input: &str, known: I) -> std::result::Result<String, (String, Option<String>)>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let folded = input.trim().to_lowercase().replace(['-', ' '], "_");

    if known.clone().into_iter().any(|s| s == folded) {
        return Ok(folded);
    }

    if let Some(&canonical) = STATUS_SYNONYMS.get(folded.as_str()) {
        if known.clone().into_iter().any(|s| s == canonical) {
            return Ok(canonical.to_string());
        }
    }

    let suggestion = known
        .into_iter()
        .map(|s| (levenshtein_distance(&folded, s), s))
        .filter(|(dist, _)| *dist <= 3)
        .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
        .map(|(_, s)| s.to_string());

    Err((input.to_string(), suggestion))
}

/// Edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}
