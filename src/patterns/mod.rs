//! Pattern matcher for folder and file names.
//!
//! Compiles the configured pattern lists once and classifies a single
//! path component (a base name, never a full path) as an epic, a feature
//! or a task. Within a list the first matching pattern wins.
//!
//! Feature matching is ancestor-aware: a pattern that does not capture
//! an epic identifier borrows the key of the nearest enclosing epic
//! folder, so `E01-x/01-foundation/F01-y` resolves to `E01-F01` just as
//! `E01-x/E01-F01-y` does.

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::config::patterns::{PatternConfig, RECOGNIZED_GROUPS};
use crate::error::{Error, Result};

/// A compiled pattern and the source text it came from.
#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

/// Epic folder match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpicMatch {
    pub key: String,
    pub slug: Option<String>,
}

/// Feature folder match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureMatch {
    pub epic_key: String,
    pub key: String,
    pub slug: Option<String>,
}

/// Task file match: the raw identifiers found in the file name.
///
/// Resolution into a full task key happens later, once frontmatter and
/// the enclosing feature folder are known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFileMatch {
    pub task_key: Option<String>,
    pub epic_num: Option<u32>,
    pub feature_num: Option<u32>,
    pub number: Option<u32>,
    pub slug: Option<String>,
    pub pattern: String,
}

impl TaskFileMatch {
    /// Full task key derivable from the file name alone.
    #[must_use]
    pub fn key_from_name(&self) -> Option<String> {
        if let Some(key) = &self.task_key {
            return Some(key.clone());
        }
        match (self.epic_num, self.feature_num, self.number) {
            (Some(e), Some(f), Some(n)) => Some(format!("T-E{e:02}-F{f:02}-{n:03}")),
            _ => None,
        }
    }
}

/// Compiled pattern lists for every entity kind.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    epic_folders: Vec<CompiledPattern>,
    epic_files: Vec<CompiledPattern>,
    feature_folders: Vec<CompiledPattern>,
    feature_files: Vec<CompiledPattern>,
    task_files: Vec<CompiledPattern>,
}

impl PatternMatcher {
    /// Compile and validate every configured pattern.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the offending pattern if it is not a
    /// valid regex, or if a folder/task pattern captures no identifier.
    pub fn new(config: &PatternConfig) -> Result<Self> {
        Ok(Self {
            epic_folders: compile("epic folder", &config.epic.folder, &["epic_id", "epic_num", "number"])?,
            epic_files: compile("epic file", &config.epic.file, &[])?,
            feature_folders: compile(
                "feature folder",
                &config.feature.folder,
                &["feature_id", "feature_num", "number"],
            )?,
            feature_files: compile("feature file", &config.feature.file, &[])?,
            task_files: compile(
                "task file",
                &config.task.file,
                &["task_key", "task_num", "number", "slug"],
            )?,
        })
    }

    /// Classify a folder name as an epic.
    #[must_use]
    pub fn match_epic(&self, name: &str) -> Option<EpicMatch> {
        let (pattern, caps) = first_match(&self.epic_folders, name)?;

        let key = group(&caps, "epic_id").map(str::to_string).or_else(|| {
            number(&caps, &["epic_num", "number"]).map(|n| format!("E{n:02}"))
        })?;

        debug!(folder = name, pattern = %pattern.source, key = %key, "Matched epic folder");
        Some(EpicMatch {
            key,
            slug: slug(&caps, "epic_slug"),
        })
    }

    /// Classify a folder name as a feature.
    ///
    /// `parent_epic` is the key of the nearest enclosing epic folder; it
    /// supplies the epic segment when the pattern does not capture one.
    /// Returns `None` unless both the epic and feature identifiers resolve.
    #[must_use]
    pub fn match_feature(&self, name: &str, parent_epic: Option<&str>) -> Option<FeatureMatch> {
        let (pattern, caps) = first_match(&self.feature_folders, name)?;

        let epic_key = group(&caps, "epic_id")
            .map(str::to_string)
            .or_else(|| number(&caps, &["epic_num"]).map(|n| format!("E{n:02}")))
            .or_else(|| parent_epic.map(str::to_string));

        let feature_id = group(&caps, "feature_id").map(str::to_string).or_else(|| {
            number(&caps, &["feature_num", "number"]).map(|n| format!("F{n:02}"))
        });

        let (Some(epic_key), Some(feature_id)) = (epic_key, feature_id) else {
            debug!(folder = name, pattern = %pattern.source, "Feature pattern matched without epic or feature id");
            return None;
        };

        let key = format!("{epic_key}-{feature_id}");
        debug!(folder = name, pattern = %pattern.source, key = %key, "Matched feature folder");
        Some(FeatureMatch {
            epic_key,
            key,
            slug: slug(&caps, "feature_slug"),
        })
    }

    /// Whether `name` is an epic document.
    #[must_use]
    pub fn is_epic_file(&self, name: &str) -> bool {
        self.epic_files.iter().any(|p| p.regex.is_match(name))
    }

    /// Whether `name` is a feature document.
    #[must_use]
    pub fn is_feature_file(&self, name: &str) -> bool {
        self.feature_files.iter().any(|p| p.regex.is_match(name))
    }

    /// Classify a file name as a task file.
    #[must_use]
    pub fn match_task_file(&self, name: &str) -> Option<TaskFileMatch> {
        let (pattern, caps) = first_match(&self.task_files, name)?;
        Some(TaskFileMatch {
            task_key: group(&caps, "task_key").map(str::to_string),
            epic_num: number(&caps, &["epic_num"]),
            feature_num: number(&caps, &["feature_num"]),
            number: number(&caps, &["task_num", "number"]),
            slug: slug(&caps, "task_slug"),
            pattern: pattern.source.clone(),
        })
    }
}

fn compile(slot: &str, sources: &[String], required: &[&str]) -> Result<Vec<CompiledPattern>> {
    sources
        .iter()
        .map(|source| {
            let regex = Regex::new(source)
                .map_err(|e| Error::Config(format!("invalid {slot} pattern '{source}': {e}")))?;

            let names: Vec<&str> = regex.capture_names().flatten().collect();
            if !required.is_empty() && !names.iter().any(|n| required.contains(n)) {
                return Err(Error::Config(format!(
                    "{slot} pattern '{source}' must capture one of: {}",
                    required.join(", ")
                )));
            }
            for name in names.iter().filter(|n| !RECOGNIZED_GROUPS.contains(n)) {
                warn!(pattern = %source, group = %name, "Unrecognized capture group in {slot} pattern");
            }

            Ok(CompiledPattern {
                source: source.clone(),
                regex,
            })
        })
        .collect()
}

fn first_match<'p, 'n>(patterns: &'p [CompiledPattern], name: &'n str) -> Option<(&'p CompiledPattern, Captures<'n>)> {
    patterns
        .iter()
        .find_map(|p| p.regex.captures(name).map(|caps| (p, caps)))
}

/// Non-empty named capture.
fn group<'n>(caps: &Captures<'n>, name: &str) -> Option<&'n str> {
    caps.name(name).map(|m| m.as_str()).filter(|s| !s.is_empty())
}

/// First of `names` that captured a decimal number.
fn number(caps: &Captures<'_>, names: &[&str]) -> Option<u32> {
    names
        .iter()
        .find_map(|n| group(caps, n).and_then(|s| s.parse().ok()))
}

/// Kind-specific slug capture, falling back to the generic `slug`.
fn slug(caps: &Captures<'_>, specific: &str) -> Option<String> {
    group(caps, specific).or_else(|| group(caps, "slug")).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::patterns::PatternOverrides;

    fn matcher() -> PatternMatcher {
        PatternMatcher::new(&PatternConfig::default()).unwrap()
    }

    fn with(json: &str) -> Result<PatternMatcher> {
        let overrides: PatternOverrides = serde_json::from_str(json).unwrap();
        PatternMatcher::new(&PatternConfig::with_overrides(Some(&overrides)))
    }

    #[test]
    fn test_match_epic() {
        let m = matcher();
        let epic = m.match_epic("E04-task-mgmt-cli").unwrap();
        assert_eq!(epic.key, "E04");
        assert_eq!(epic.slug.as_deref(), Some("task-mgmt-cli"));

        assert!(m.match_epic("E4-short").is_none());
        assert!(m.match_epic("docs").is_none());
    }

    #[test]
    fn test_match_feature_direct_child() {
        let m = matcher();
        let feature = m.match_feature("E02-F01-sync-engine", None).unwrap();
        assert_eq!(feature.key, "E02-F01");
        assert_eq!(feature.epic_key, "E02");
    }

    #[test]
    fn test_match_feature_borrows_ancestor_epic() {
        let m = matcher();
        let feature = m.match_feature("F03-discovery", Some("E01")).unwrap();
        assert_eq!(feature.key, "E01-F03");
        assert_eq!(feature.slug.as_deref(), Some("discovery"));
    }

    #[test]
    fn test_match_feature_rejected_without_epic() {
        let m = matcher();
        assert!(m.match_feature("F03-discovery", None).is_none());
        assert!(m.match_feature("01-foundation", Some("E01")).is_none());
    }

    #[test]
    fn test_first_pattern_wins() {
        let m = with(
            r#"{"epic": {"folder": ["^epic-(?P<number>\\d+)$", "^epic-(?P<epic_id>.+)$"]}}"#,
        )
        .unwrap();
        assert_eq!(m.match_epic("epic-7").unwrap().key, "E07");
        assert_eq!(m.match_epic("epic-E12").unwrap().key, "E12");
    }

    #[test]
    fn test_task_file_patterns() {
        let m = matcher();

        let full = m.match_task_file("T-E01-F02-003-write-tests.md").unwrap();
        assert_eq!(full.key_from_name().as_deref(), Some("T-E01-F02-003"));

        let numbered = m.match_task_file("004-add-cache.md").unwrap();
        assert_eq!(numbered.number, Some(4));
        assert_eq!(numbered.slug.as_deref(), Some("add-cache"));
        assert!(numbered.key_from_name().is_none());

        let prp = m.match_task_file("cache-layer.prp.md").unwrap();
        assert_eq!(prp.slug.as_deref(), Some("cache-layer"));
        assert!(prp.number.is_none());

        assert!(m.match_task_file("notes.txt").is_none());
    }

    #[test]
    fn test_document_files() {
        let m = matcher();
        assert!(m.is_epic_file("epic.md"));
        assert!(!m.is_epic_file("README.md"));
        assert!(m.is_feature_file("prd.md"));
        assert!(m.is_feature_file("PRD_F01-sync.md"));
    }

    #[test]
    fn test_invalid_regex_names_pattern() {
        let err = with(r#"{"epic": {"folder": ["^E(?P<number>\\d{2}"]}}"#).unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains("epic folder")),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_missing_required_group() {
        let err = with(r#"{"feature": {"folder": ["^feat-(?P<slug>.+)$"]}}"#).unwrap_err();
        match err {
            Error::Config(msg) => {
                assert!(msg.contains("feat-"));
                assert!(msg.contains("feature_num"));
            }
            other => panic!("unexpected: {other}"),
        }
    }
}
