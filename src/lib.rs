//! Planbook CLI - keep epics, features and tasks in markdown and SQLite in sync
//!
//! This crate provides the core functionality for the `pb` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Project root discovery and `.planbook.json`
//! - [`patterns`] - Folder and file naming patterns
//! - [`discovery`] - Epic/feature folder classification and frontmatter
//! - [`workflow`] - Status graph and transition validation
//! - [`sync`] - Markdown to database reconciliation with conflict resolution
//! - [`model`] - Data types (Epic, Feature, Task)
//! - [`storage`] - SQLite database layer
//! - [`validate`] - Key formats and status normalization
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod patterns;
pub mod storage;
pub mod sync;
pub mod validate;
pub mod workflow;

pub use error::{Error, Result};
