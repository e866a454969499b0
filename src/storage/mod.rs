//! SQLite storage layer for Planbook.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - Status history for tasks
//! - A lazily opened process-wide handle
//!
//! # Submodules
//!
//! - [`events`] - Task status history
//! - [`global`] - Shared handle with idempotent close
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod global;
pub mod schema;
pub mod sqlite;

pub use events::{ChangeSource, StatusChange};
pub use global::{close_db, get_or_open, SharedStorage};
pub use sqlite::{
    insert_record, update_record, MutationContext, NewRecord, RecordUpdate, SqliteStorage,
    TaskFilter,
};
