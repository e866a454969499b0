//! Markdown to SQLite sync.
//!
//! This module reconciles the docs tree with the database:
//!
//! - **Scanning**: folder discovery plus task files → [`ChangeCandidate`]s
//! - **Filtering**: only files modified since the checkpoint (or never imported)
//! - **Conflicts**: fields edited on both sides since the checkpoint
//! - **Resolution**: `file-wins`, `db-wins`, `newer-wins` or `manual`
//! - **Checkpoint**: `last_sync_time` in `.planbook.json`, moved only after a commit
//!
//! # Example
//!
//! ```ignore
//! use pb::sync::{SyncEngine, SyncOptions, ConflictStrategy};
//!
//! let mut options = SyncOptions::new(root.clone(), root.join("docs/plan"));
//! options.strategy = ConflictStrategy::NewerWins;
//!
//! let report = SyncEngine::new(&mut storage, &matcher, &workflow).run(&options)?;
//! println!("{}", pb::sync::format_report(&report));
//! ```

mod checkpoint;
mod conflict;
mod engine;
mod file;
mod incremental;
mod report;
mod resolver;
mod scanner;
mod types;

pub use checkpoint::{format_checkpoint, load_checkpoint, parse_checkpoint, save_checkpoint, CHECKPOINT_KEY};
pub use conflict::{detect, diff_fields, Detection, FieldDiff};
pub use engine::SyncEngine;
pub use file::atomic_write;
pub use incremental::{filter_changed, ExistingRecords, CLOCK_SKEW_TOLERANCE_MS};
pub use report::format_report;
pub use resolver::{resolve, ConflictPrompt, LinePrompt};
pub use scanner::{CandidateScanner, CandidateSet, MAX_FILE_SIZE};
pub use types::{
    ChangeCandidate, ConflictRecord, ConflictStrategy, EntityCounts, Resolution, SyncError,
    SyncOptions, SyncReport,
};
