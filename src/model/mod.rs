//! Data models for Planbook.
//!
//! This module contains the work-breakdown hierarchy:
//! - Epic
//! - Feature (belongs to one epic)
//! - Task (belongs to one feature)

pub mod entity;

pub use entity::{EntityKind, EntityRecord, Epic, Feature, Task};
