//! Turn the docs tree into sync candidates.
//!
//! Epics and features come from folder discovery; their documents, when
//! present, supply the tracked fields. Task files are found by a second
//! walk and attached to the nearest enclosing feature folder.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::discovery::{extract_title, parse_document, title_from_slug, FolderScanner, ScanResult};
use crate::error::Result;
use crate::model::EntityKind;
use crate::patterns::PatternMatcher;
use crate::sync::types::ChangeCandidate;
use crate::validate::{split_task_key, validate_task_key};
use crate::workflow::WorkflowGraph;

/// Files larger than this are skipped.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Task priorities the database accepts.
pub const PRIORITY_RANGE: std::ops::RangeInclusive<i32> = 1..=10;

/// Candidates for one sync cycle.
#[derive(Debug, Default)]
pub struct CandidateSet {
    /// Epics first, then features, then tasks.
    pub candidates: Vec<ChangeCandidate>,
    /// Documents and task files read, malformed ones included.
    pub files_scanned: usize,
    pub warnings: Vec<String>,
}

/// A parsed markdown file.
struct FileData {
    mtime: i64,
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
    task_key: Option<String>,
    feature: Option<String>,
    priority: Option<i32>,
    assigned_agent: Option<String>,
}

/// Builds [`ChangeCandidate`]s from a docs root.
pub struct CandidateScanner<'a> {
    matcher: &'a PatternMatcher,
    workflow: &'a WorkflowGraph,
    project_root: &'a Path,
}

impl<'a> CandidateScanner<'a> {
    #[must_use]
    pub const fn new(matcher: &'a PatternMatcher, workflow: &'a WorkflowGraph, project_root: &'a Path) -> Self {
        Self {
            matcher,
            workflow,
            project_root,
        }
    }

    /// Scan `docs_root` and build every candidate.
    ///
    /// Per-file problems become warnings and exclude that file.
    ///
    /// # Errors
    ///
    /// Returns an error if `docs_root` does not exist.
    pub fn scan(&self, docs_root: &Path) -> Result<CandidateSet> {
        let discovered = FolderScanner::new(self.matcher).scan(docs_root)?;
        let mut set = CandidateSet {
            warnings: discovered.warnings.clone(),
            ..CandidateSet::default()
        };

        self.folder_candidates(&discovered, &mut set);
        self.task_candidates(docs_root, &discovered, &mut set);

        debug!(
            candidates = set.candidates.len(),
            files = set.files_scanned,
            warnings = set.warnings.len(),
            "Built sync candidates"
        );
        Ok(set)
    }

    fn folder_candidates(&self, discovered: &ScanResult, set: &mut CandidateSet) {
        for epic in &discovered.epics {
            let fallback = epic.slug.as_deref().map_or_else(|| epic.key.clone(), title_from_slug);
            let candidate = self.entity_candidate(
                EntityKind::Epic,
                &epic.key,
                None,
                &epic.path,
                epic.doc_path.as_deref(),
                fallback,
                set,
            );
            set.candidates.push(candidate);
        }

        for feature in &discovered.features {
            let fallback = feature
                .slug
                .as_deref()
                .map_or_else(|| feature.key.clone(), title_from_slug);
            let candidate = self.entity_candidate(
                EntityKind::Feature,
                &feature.key,
                Some(&feature.epic_key),
                &feature.path,
                feature.prd_path.as_deref(),
                fallback,
                set,
            );
            set.candidates.push(candidate);
        }
    }

    /// Candidate for an epic or feature, backed by its document if it has
    /// one and by the bare folder otherwise.
    #[allow(clippy::too_many_arguments)]
    fn entity_candidate(
        &self,
        kind: EntityKind,
        key: &str,
        parent_key: Option<&str>,
        folder: &Path,
        doc: Option<&Path>,
        fallback_title: String,
        set: &mut CandidateSet,
    ) -> ChangeCandidate {
        let mut candidate = ChangeCandidate {
            kind,
            key: key.to_string(),
            parent_key: parent_key.map(str::to_string),
            file_path: self.display_path(folder),
            mtime: 0,
            is_file: false,
            fields: BTreeMap::new(),
            fallback_title,
            priority: None,
            assigned_agent: None,
        };

        if let Some(doc) = doc {
            set.files_scanned += 1;
            match read_file(doc) {
                Ok(data) => {
                    candidate.file_path = self.display_path(doc);
                    candidate.mtime = data.mtime;
                    candidate.is_file = true;
                    insert_field(&mut candidate.fields, "title", data.title);
                    insert_field(&mut candidate.fields, "description", data.description);
                }
                Err(problem) => {
                    // The folder still defines the entity; only the document is ignored
                    warn!(path = %doc.display(), %problem, "Skipping malformed {kind} document");
                    set.warnings.push(format!("{}: {problem}", self.display_path(doc)));
                }
            }
        }

        if !candidate.is_file {
            candidate.mtime = fs::metadata(folder).ok().and_then(|m| mtime_ms(&m)).unwrap_or(0);
        }
        candidate
    }

    fn task_candidates(&self, docs_root: &Path, discovered: &ScanResult, set: &mut CandidateSet) {
        let feature_dirs: HashMap<&Path, &str> = discovered
            .features
            .iter()
            .map(|f| (f.path.as_path(), f.key.as_str()))
            .collect();
        let documents: HashSet<PathBuf> = discovered
            .epics
            .iter()
            .filter_map(|e| e.doc_path.clone())
            .chain(discovered.features.iter().filter_map(|f| f.prd_path.clone()))
            .collect();
        let mut seen: HashMap<String, String> = HashMap::new();

        let walker = WalkDir::new(docs_root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        // Unreadable directories were already reported by folder discovery
        for entry in walker.filter_map(std::result::Result::ok) {
            if !entry.file_type().is_file() || documents.contains(entry.path()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            let Some(matched) = self.matcher.match_task_file(&name) else {
                continue;
            };

            set.files_scanned += 1;
            let path = entry.path();
            let shown = self.display_path(path);

            let data = match read_file(path) {
                Ok(data) => data,
                Err(problem) => {
                    warn!(path = %path.display(), %problem, "Skipping malformed task file");
                    set.warnings.push(format!("{shown}: {problem}"));
                    continue;
                }
            };

            let folder_feature = path
                .ancestors()
                .skip(1)
                .take_while(|dir| dir.starts_with(docs_root))
                .find_map(|dir| feature_dirs.get(dir).copied());

            let key = data
                .task_key
                .clone()
                .or_else(|| matched.key_from_name())
                .or_else(|| {
                    let feature = folder_feature.or(data.feature.as_deref())?;
                    Some(format!("T-{feature}-{:03}", matched.number?))
                });

            let Some(key) = key else {
                set.warnings.push(format!(
                    "{shown}: cannot determine task key (add task_key to the frontmatter or place the file in a feature folder)"
                ));
                continue;
            };
            if let Err(e) = validate_task_key(&key) {
                set.warnings.push(format!("{shown}: {e}"));
                continue;
            }
            let Some((_, feature_key)) = split_task_key(&key) else {
                continue;
            };

            let status = match data.status.as_deref().map(|s| self.workflow.normalize(s)) {
                None => None,
                Some(Ok(status)) => Some(status),
                Some(Err(e)) => {
                    warn!(path = %path.display(), error = %e, "Skipping task file with unknown status");
                    set.warnings.push(format!("{shown}: {e}"));
                    continue;
                }
            };

            if let Some(first) = seen.get(&key) {
                set.warnings
                    .push(format!("{shown}: duplicate task key {key} (already defined in {first})"));
                continue;
            }
            seen.insert(key.clone(), shown.clone());

            let mut fields = BTreeMap::new();
            insert_field(&mut fields, "title", data.title);
            insert_field(&mut fields, "description", data.description);
            insert_field(&mut fields, "status", status);

            set.candidates.push(ChangeCandidate {
                kind: EntityKind::Task,
                parent_key: Some(feature_key.to_string()),
                fallback_title: matched.slug.as_deref().map_or_else(|| key.clone(), title_from_slug),
                key,
                file_path: shown,
                mtime: data.mtime,
                is_file: true,
                fields,
                priority: data.priority,
                assigned_agent: data.assigned_agent,
            });
        }
    }

    /// Path as stored on rows: relative to the project root when inside it.
    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(self.project_root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

fn insert_field(fields: &mut BTreeMap<&'static str, String>, name: &'static str, value: Option<String>) {
    if let Some(value) = value {
        fields.insert(name, value);
    }
}

fn read_file(path: &Path) -> std::result::Result<FileData, String> {
    let meta = fs::metadata(path).map_err(|e| format!("cannot stat file: {e}"))?;
    if meta.len() > MAX_FILE_SIZE {
        return Err(format!(
            "file is {} bytes, larger than the {MAX_FILE_SIZE} byte limit",
            meta.len()
        ));
    }
    let mtime = mtime_ms(&meta).ok_or_else(|| "cannot read modification time".to_string())?;
    let content = fs::read_to_string(path).map_err(|e| format!("cannot read file: {e}"))?;
    let doc = parse_document(&content).map_err(|e| format!("invalid frontmatter: {e}"))?;

    let fm = doc.frontmatter;
    if let Some(p) = fm.priority.filter(|p| !PRIORITY_RANGE.contains(p)) {
        return Err(format!(
            "priority {p} is outside {}-{}",
            PRIORITY_RANGE.start(),
            PRIORITY_RANGE.end()
        ));
    }
    let title = fm
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| extract_title(doc.body));

    Ok(FileData {
        mtime,
        title,
        description: fm.description.map(|d| d.trim().to_string()),
        status: fm.status.filter(|s| !s.trim().is_empty()),
        task_key: fm.task_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
        feature: fm.feature.map(|f| f.trim().to_string()).filter(|f| !f.is_empty()),
        priority: fm.priority,
        assigned_agent: fm.assigned_agent,
    })
}

/// Modification time in Unix milliseconds, rounded up.
///
/// The checkpoint is floored to the millisecond, so a file written in the
/// same millisecond a sync started still compares as newer.
#[must_use]
pub fn mtime_ms(meta: &fs::Metadata) -> Option<i64> {
    meta.modified().ok().map(ceil_millis)
}

fn ceil_millis(t: SystemTime) -> i64 {
    let at = DateTime::<Utc>::from(t);
    let ms = at.timestamp_millis();
    if at.timestamp_subsec_nanos() % 1_000_000 == 0 { ms } else { ms + 1 }
}
