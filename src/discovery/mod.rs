//! Folder discovery.
//!
//! Walks the docs root and classifies directories as epics and features
//! using the configured naming patterns:
//!
//! ```text
//! docs/plan/
//! ├── E01-platform/                 epic E01 (epic.md is its document)
//! │   ├── 01-foundation/            organizational, transparent
//! │   │   └── F01-storage/          feature E01-F01 (parent epic borrowed)
//! │   │       ├── prd.md            primary document
//! │   │       ├── notes.md          related document
//! │   │       └── tasks/
//! │   │           └── 001-schema.md task T-E01-F01-001 (sync's concern)
//! │   └── E01-F02-cli/              feature E01-F02
//! └── E02-sync/
//! ```
//!
//! Classification never stops traversal: every directory is descended
//! into whether or not it matched.

pub mod frontmatter;
mod scanner;

pub use frontmatter::{extract_title, parse_document, title_from_slug, Document, Frontmatter};
pub use scanner::FolderScanner;

use std::path::PathBuf;

use serde::Serialize;

/// An epic folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredEpic {
    pub key: String,
    pub slug: Option<String>,
    pub path: PathBuf,
    /// Epic document (first file matching an epic file pattern).
    pub doc_path: Option<PathBuf>,
}

/// A feature folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredFeature {
    pub key: String,
    pub epic_key: String,
    pub slug: Option<String>,
    pub path: PathBuf,
    pub prd_path: Option<PathBuf>,
    /// Other markdown files directly inside the feature folder.
    pub related_docs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub folders_scanned: usize,
    pub files_analyzed: usize,
    pub related_docs: usize,
}

/// Everything a scan found.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    pub epics: Vec<DiscoveredEpic>,
    pub features: Vec<DiscoveredFeature>,
    pub stats: ScanStats,
    /// Non-fatal problems (unreadable directories, invalid keys, duplicates).
    pub warnings: Vec<String>,
}
