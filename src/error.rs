//! Error types for Planbook.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags for agent self-correction
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::sync::SyncError;

/// Result type alias for Planbook operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Agents match on the string; shell scripts on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    EntityNotFound,

    // Validation (exit 4)
    InvalidStatus,
    InvalidTransition,
    InvalidKey,
    InvalidArgument,

    // Sync (exit 6)
    SyncError,

    // Config (exit 7)
    ConfigError,
    WorkflowError,

    // I/O (exit 8)
    IoError,
    JsonError,
    YamlError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::EntityNotFound => "ENTITY_NOT_FOUND",
            Self::InvalidStatus => "INVALID_STATUS",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::InvalidKey => "INVALID_KEY",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::WorkflowError => "WORKFLOW_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::YamlError => "YAML_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::EntityNotFound => 3,
            Self::InvalidStatus
            | Self::InvalidTransition
            | Self::InvalidKey
            | Self::InvalidArgument => 4,
            Self::SyncError => 6,
            Self::ConfigError | Self::WorkflowError => 7,
            Self::IoError | Self::JsonError | Self::YamlError => 8,
        }
    }

    /// Whether an agent should retry with corrected input.
    ///
    /// True for validation errors and transient database failures
    /// (a sync aborted by a locked database is safe to run again).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidStatus
                | Self::InvalidTransition
                | Self::InvalidKey
                | Self::InvalidArgument
                | Self::DatabaseError
                | Self::SyncError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Planbook operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `pb init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("{kind} not found: {key}")]
    EntityNotFound { kind: &'static str, key: String },

    #[error("Status '{status}' is not defined in the current workflow")]
    UnknownStatus { status: String, valid: Vec<String> },

    #[error("Target status '{status}' is not defined in the current workflow")]
    UnknownTargetStatus { status: String, valid: Vec<String> },

    #[error("Cannot transition from '{status}' to itself")]
    SelfTransition { status: String },

    #[error("Invalid transition from '{from}' to '{to}'")]
    InvalidTransition {
        from: String,
        to: String,
        allowed: Vec<String>,
    },

    #[error("Invalid workflow: {message}")]
    InvalidWorkflow { message: String, fix: String },

    #[error("Invalid {kind} key: '{key}'")]
    InvalidKey { kind: &'static str, key: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::EntityNotFound { .. } => ErrorCode::EntityNotFound,
            Self::UnknownStatus { .. } | Self::UnknownTargetStatus { .. } => {
                ErrorCode::InvalidStatus
            }
            Self::SelfTransition { .. } | Self::InvalidTransition { .. } => {
                ErrorCode::InvalidTransition
            }
            Self::InvalidWorkflow { .. } => ErrorCode::WorkflowError,
            Self::InvalidKey { .. } => ErrorCode::InvalidKey,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Sync(_) => ErrorCode::SyncError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Yaml(_) => ErrorCode::YamlError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for agents and humans.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `pb init` in the project root to create .planbook.json".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Project already initialized at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::EntityNotFound { key, .. } => Some(format!(
                "No record with key '{key}'. Run `pb sync` to import it from the docs folder."
            )),

            Self::UnknownStatus { status, .. } => Some(format!(
                "'{status}' may come from an older workflow configuration.\n  \
                 List valid statuses: pb workflow list\n  \
                 Override validation: pass --force"
            )),

            Self::UnknownTargetStatus { valid, .. } => {
                Some(format!("Valid statuses: {}", valid.join(", ")))
            }

            Self::SelfTransition { .. } => {
                Some("The entity already has this status; nothing to change.".to_string())
            }

            Self::InvalidTransition { from, allowed, .. } => {
                if allowed.is_empty() {
                    Some(format!(
                        "'{from}' is a terminal status. Use --force to override workflow validation."
                    ))
                } else {
                    Some(format!(
                        "Allowed next statuses from '{from}': {}. Use --force to override.",
                        allowed.join(", ")
                    ))
                }
            }

            Self::InvalidWorkflow { fix, .. } => Some(format!("Fix: {fix}")),

            Self::InvalidKey { kind, .. } => Some(match *kind {
                "epic" => "Epic keys look like E01".to_string(),
                "feature" => "Feature keys look like E01-F02".to_string(),
                _ => "Task keys look like T-E01-F02-003".to_string(),
            }),

            Self::Sync(e) => e.hint(),

            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Yaml(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint. Agents parse this instead of stderr text.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
