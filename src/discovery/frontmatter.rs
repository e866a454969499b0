//! YAML frontmatter and markdown metadata extraction.
//!
//! A document may start with a YAML block between `---` lines:
//!
//! ```text
//! ---
//! task_key: T-E01-F02-003
//! title: Write the sync engine
//! status: in_progress
//! ---
//! # Body
//! ```
//!
//! A document without a leading `---` simply has no frontmatter. A block
//! that is opened but never closed, or that is not valid YAML, is a parse
//! error for that one file.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Fields recognized in frontmatter. Everything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Frontmatter {
    #[serde(default)]
    pub task_key: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub feature: Option<String>,
    #[serde(default)]
    pub assigned_agent: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
}

/// A markdown document split into frontmatter and body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document<'a> {
    pub frontmatter: Frontmatter,
    pub has_frontmatter: bool,
    pub body: &'a str,
}

/// Split and parse a markdown document.
///
/// # Errors
///
/// Returns `Error::InvalidArgument` if the frontmatter has no closing
/// delimiter, or `Error::Yaml` if it is not valid YAML.
pub fn parse_document(content: &str) -> Result<Document<'_>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return Ok(Document {
            body: content,
            ..Document::default()
        });
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let frontmatter = if yaml.trim().is_empty() {
                Frontmatter::default()
            } else {
                serde_yaml::from_str(yaml)?
            };
            return Ok(Document {
                frontmatter,
                has_frontmatter: true,
                body,
            });
        }
        offset += line.len();
    }

    Err(Error::InvalidArgument(
        "frontmatter missing closing delimiter '---'".to_string(),
    ))
}

const TITLE_PREFIXES: [&str; 4] = ["task:", "prp:", "todo:", "wip:"];

/// First level-one heading of a markdown body, with common prefixes
/// such as `Task:` removed.
#[must_use]
pub fn extract_title(body: &str) -> Option<String> {
    let heading = body
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))?
        .trim();

    let stripped = TITLE_PREFIXES
        .iter()
        .find(|p| heading.get(..p.len()).is_some_and(|h| h.eq_ignore_ascii_case(p)))
        .map_or(heading, |p| heading[p.len()..].trim_start());

    (!stripped.is_empty()).then(|| stripped.to_string())
}

/// Title-case a slug: `add-sync-engine` → `Add Sync Engine`.
#[must_use]
pub fn title_from_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_frontmatter() {
        let doc = parse_document(
            "---\ntask_key: T-E01-F02-003\ntitle: Build it\nstatus: todo\npriority: 3\nextra: ignored\n---\n# Heading\nBody\n",
        )
        .unwrap();

        assert!(doc.has_frontmatter);
        assert_eq!(doc.frontmatter.task_key.as_deref(), Some("T-E01-F02-003"));
        assert_eq!(doc.frontmatter.title.as_deref(), Some("Build it"));
        assert_eq!(doc.frontmatter.priority, Some(3));
        assert_eq!(doc.body, "# Heading\nBody\n");
    }

    #[test]
    fn test_parse_without_frontmatter() {
        let doc = parse_document("# Just markdown\n").unwrap();
        assert!(!doc.has_frontmatter);
        assert_eq!(doc.frontmatter, Frontmatter::default());
        assert_eq!(doc.body, "# Just markdown\n");
    }

    #[test]
    fn test_empty_frontmatter_block() {
        let doc = parse_document("---\n---\nbody").unwrap();
        assert!(doc.has_frontmatter);
        assert_eq!(doc.frontmatter, Frontmatter::default());
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn test_crlf_frontmatter() {
        let doc = parse_document("---\r\ntitle: Windows\r\n---\r\nbody").unwrap();
        assert_eq!(doc.frontmatter.title.as_deref(), Some("Windows"));
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn test_unclosed_frontmatter_is_error() {
        assert!(parse_document("---\ntitle: open\n# body\n").is_err());
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let err = parse_document("---\ntitle: [unclosed\n---\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title("intro\n# Task: Add cache\n").as_deref(), Some("Add cache"));
        assert_eq!(extract_title("# WIP: Refactor").as_deref(), Some("Refactor"));
        assert_eq!(extract_title("# Plain title").as_deref(), Some("Plain title"));
        assert_eq!(extract_title("## Not level one"), None);
        assert_eq!(extract_title("# Task:"), None);
    }

    #[test]
    fn test_title_from_slug() {
        assert_eq!(title_from_slug("add-sync-engine"), "Add Sync Engine");
        assert_eq!(title_from_slug("cache_layer"), "Cache Layer");
        assert_eq!(title_from_slug(""), "");
    }
}
