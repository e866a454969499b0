//! Depth-first folder scanner.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use super::{DiscoveredEpic, DiscoveredFeature, ScanResult};
use crate::error::Result;
use crate::patterns::PatternMatcher;
use crate::sync::SyncError;
use crate::validate::{validate_epic_key, validate_feature_key};

/// Classifies the directories under a docs root.
#[derive(Debug, Clone, Copy)]
pub struct FolderScanner<'m> {
    matcher: &'m PatternMatcher,
}

impl<'m> FolderScanner<'m> {
    #[must_use]
    pub const fn new(matcher: &'m PatternMatcher) -> Self {
        Self { matcher }
    }

    /// Walk `root` and collect epics and features.
    ///
    /// Unreadable entries, invalid keys and duplicates become warnings on
    /// the result; only a missing root is an error.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::DocsRootMissing` if `root` is not a directory.
    pub fn scan(&self, root: &Path) -> Result<ScanResult> {
        if !root.is_dir() {
            return Err(SyncError::DocsRootMissing {
                path: root.to_path_buf(),
            }
            .into());
        }

        let mut result = ScanResult::default();
        // Directory -> key of the nearest enclosing (or own) epic
        let mut epic_of: HashMap<PathBuf, String> = HashMap::new();
        let mut epic_keys: HashSet<String> = HashSet::new();
        let mut feature_keys: HashSet<String> = HashSet::new();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden_dir(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let at = e.path().map_or_else(|| root.display().to_string(), |p| p.display().to_string());
                    warn!(path = %at, error = %e, "Skipping unreadable path");
                    result.warnings.push(format!("skipped unreadable path {at}: {e}"));
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            result.stats.folders_scanned += 1;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy();
            let parent_epic = path.parent().and_then(|p| epic_of.get(p)).cloned();

            if let Some(m) = self.matcher.match_epic(&name) {
                if let Err(e) = validate_epic_key(&m.key) {
                    warn!(path = %path.display(), key = %m.key, "Epic folder yields an invalid key");
                    result.warnings.push(format!("{}: {e}", path.display()));
                } else {
                    epic_of.insert(path.to_path_buf(), m.key.clone());
                    if epic_keys.insert(m.key.clone()) {
                        let doc_path = self.epic_doc(path, &mut result);
                        debug!(key = %m.key, path = %path.display(), "Discovered epic");
                        result.epics.push(DiscoveredEpic {
                            key: m.key,
                            slug: m.slug,
                            path: path.to_path_buf(),
                            doc_path,
                        });
                    } else {
                        result
                            .warnings
                            .push(format!("{}: duplicate epic key {}", path.display(), m.key));
                    }
                    continue;
                }
            }

            let Some(parent_epic) = parent_epic else {
                continue;
            };

            if let Some(m) = self.matcher.match_feature(&name, Some(&parent_epic)) {
                if let Err(e) = validate_feature_key(&m.key) {
                    warn!(path = %path.display(), key = %m.key, "Feature folder yields an invalid key");
                    result.warnings.push(format!("{}: {e}", path.display()));
                } else if m.epic_key != parent_epic {
                    result.warnings.push(format!(
                        "{}: feature {} is inside epic {parent_epic}",
                        path.display(),
                        m.key
                    ));
                } else if feature_keys.insert(m.key.clone()) {
                    let feature = self.feature(path, m.key, m.epic_key, m.slug, &mut result);
                    debug!(key = %feature.key, path = %path.display(), "Discovered feature");
                    result.features.push(feature);
                } else {
                    result
                        .warnings
                        .push(format!("{}: duplicate feature key {}", path.display(), m.key));
                }
            }

            epic_of.insert(path.to_path_buf(), parent_epic);
        }

        Ok(result)
    }

    fn epic_doc(&self, dir: &Path, result: &mut ScanResult) -> Option<PathBuf> {
        let doc = list_files(dir, result)
            .into_iter()
            .find(|(name, _)| self.matcher.is_epic_file(name))
            .map(|(_, path)| path);
        if doc.is_some() {
            result.stats.files_analyzed += 1;
        }
        doc
    }

    fn feature(
        &self,
        dir: &Path,
        key: String,
        epic_key: String,
        slug: Option<String>,
        result: &mut ScanResult,
    ) -> DiscoveredFeature {
        let files = list_files(dir, result);

        let prd_name = files
            .iter()
            .find(|(name, _)| name == "prd.md")
            .or_else(|| {
                files
                    .iter()
                    .find(|(name, _)| name.starts_with("PRD_") && self.matcher.is_feature_file(name))
            })
            .map(|(name, _)| name.clone());

        let prd_path = prd_name.as_ref().map(|name| dir.join(name));
        let related_docs: Vec<PathBuf> = files
            .into_iter()
            .filter(|(name, _)| {
                Path::new(name).extension().is_some_and(|ext| ext == "md")
                    && name != "prd.md"
                    && prd_name.as_deref() != Some(name.as_str())
            })
            .map(|(_, path)| path)
            .collect();

        result.stats.files_analyzed += usize::from(prd_path.is_some()) + related_docs.len();
        result.stats.related_docs += related_docs.len();

        DiscoveredFeature {
            key,
            epic_key,
            slug,
            path: dir.to_path_buf(),
            prd_path,
            related_docs,
        }
    }
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with('.')
}

/// Regular files directly inside `dir`, sorted by name.
fn list_files(dir: &Path, result: &mut ScanResult) -> Vec<(String, PathBuf)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Cannot list folder");
            result.warnings.push(format!("cannot list {}: {e}", dir.display()));
            return Vec::new();
        }
    };

    let mut files: Vec<(String, PathBuf)> = entries
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::patterns::{PatternConfig, PatternOverrides};
    use std::fs;
    use tempfile::TempDir;

    fn scan(root: &Path) -> ScanResult {
        let matcher = PatternMatcher::new(&PatternConfig::default()).unwrap();
        FolderScanner::new(&matcher).scan(root).unwrap()
    }

    fn keys(result: &ScanResult) -> (Vec<&str>, Vec<&str>) {
        (
            result.epics.iter().map(|e| e.key.as_str()).collect(),
            result.features.iter().map(|f| f.key.as_str()).collect(),
        )
    }

    #[test]
    fn test_feature_under_organizational_folder() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("E01-x/01-foundation/F01-y")).unwrap();

        let result = scan(dir.path());
        assert_eq!(keys(&result), (vec!["E01"], vec!["E01-F01"]));
        assert_eq!(result.features[0].epic_key, "E01");
        assert_eq!(result.stats.folders_scanned, 3);
    }

    #[test]
    fn test_feature_as_direct_child() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("E02-x/E02-F01-y")).unwrap();

        let result = scan(dir.path());
        assert_eq!(keys(&result), (vec!["E02"], vec!["E02-F01"]));
    }

    #[test]
    fn test_feature_outside_epic_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("misc/F01-orphan")).unwrap();

        let result = scan(dir.path());
        assert!(result.epics.is_empty());
        assert!(result.features.is_empty());
    }

    #[test]
    fn test_feature_epic_mismatch_warns() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("E01-x/E02-F01-y")).unwrap();

        let result = scan(dir.path());
        assert!(result.features.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("inside epic E01"));
    }

    #[test]
    fn test_descends_through_matched_folders() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("E01-x/F01-a/sub/F02-b")).unwrap();
        fs::create_dir_all(dir.path().join("E01-x/F01-a/tasks")).unwrap();

        let result = scan(dir.path());
        assert_eq!(keys(&result), (vec!["E01"], vec!["E01-F01", "E01-F02"]));
    }

    #[test]
    fn test_hidden_directories_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".archive/E09-old")).unwrap();
        fs::create_dir_all(dir.path().join("E01-x")).unwrap();

        let result = scan(dir.path());
        assert_eq!(keys(&result).0, vec!["E01"]);
    }

    #[test]
    fn test_documents_cataloged() {
        let dir = TempDir::new().unwrap();
        let epic = dir.path().join("E01-x");
        let feature = epic.join("E01-F01-y");
        fs::create_dir_all(feature.join("tasks")).unwrap();
        fs::write(epic.join("epic.md"), "# Epic").unwrap();
        fs::write(feature.join("PRD_F01-y.md"), "# PRD").unwrap();
        fs::write(feature.join("prd.md"), "# PRD").unwrap();
        fs::write(feature.join("notes.md"), "notes").unwrap();
        fs::write(feature.join("diagram.png"), "").unwrap();
        fs::write(feature.join("tasks/001-a.md"), "").unwrap();

        let result = scan(dir.path());
        assert_eq!(result.epics[0].doc_path, Some(epic.join("epic.md")));

        let f = &result.features[0];
        assert_eq!(f.prd_path, Some(feature.join("prd.md")));
        assert_eq!(
            f.related_docs,
            vec![feature.join("PRD_F01-y.md"), feature.join("notes.md")]
        );
        assert_eq!(result.stats.related_docs, 2);
        assert_eq!(result.stats.files_analyzed, 4);
    }

    #[test]
    fn test_prd_underscore_fallback() {
        let dir = TempDir::new().unwrap();
        let feature = dir.path().join("E01-x/E01-F03-z");
        fs::create_dir_all(&feature).unwrap();
        fs::write(feature.join("PRD_F03-z.md"), "# PRD").unwrap();

        let result = scan(dir.path());
        assert_eq!(result.features[0].prd_path, Some(feature.join("PRD_F03-z.md")));
        assert!(result.features[0].related_docs.is_empty());
    }

    #[test]
    fn test_invalid_key_is_warning_and_not_matched() {
        let overrides: PatternOverrides =
            serde_json::from_str(r#"{"epic": {"folder": ["^epic-(?P<number>\\d+)$"]}}"#).unwrap();
        let matcher =
            PatternMatcher::new(&PatternConfig::with_overrides(Some(&overrides))).unwrap();

        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("epic-123")).unwrap();
        fs::create_dir_all(dir.path().join("epic-4")).unwrap();

        let result = FolderScanner::new(&matcher).scan(dir.path()).unwrap();
        assert_eq!(keys(&result).0, vec!["E04"]);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("E123"));
    }

    #[test]
    fn test_duplicate_epic_key_warns() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("E01-a")).unwrap();
        fs::create_dir_all(dir.path().join("E01-b")).unwrap();

        let result = scan(dir.path());
        assert_eq!(result.epics.len(), 1);
        assert!(result.warnings[0].contains("duplicate epic key E01"));
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = TempDir::new().unwrap();
        let matcher = PatternMatcher::new(&PatternConfig::default()).unwrap();
        assert!(FolderScanner::new(&matcher).scan(&dir.path().join("nope")).is_err());
    }
}
