//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::sync::ConflictStrategy;

/// Output format for list/query commands.
#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Table,
    /// JSON (same as --json)
    Json,
}

pub mod commands;

/// Planbook CLI - keep epics, features and tasks in markdown and SQLite in sync
#[derive(Parser, Debug)]
#[command(name = "pb", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: planbook.db in the project root)
    #[arg(long, global = true, env = "PB_DB")]
    pub db: Option<PathBuf>,

    /// Actor name for status history
    #[arg(long, global = true, env = "PB_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON (for agent integration)
    #[arg(long, alias = "robot", global = true)]
    pub json: bool,

    /// Output format (table, json)
    #[arg(long, value_enum, global = true, default_value_t)]
    pub format: OutputFormat,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a Planbook project in the current directory
    Init {
        /// Markdown root to scan (relative to the project root)
        #[arg(long)]
        docs_root: Option<String>,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Reconcile the docs folder with the database
    Sync(SyncArgs),

    /// List the epics and features found in the docs folder
    Discover {
        /// Docs folder to scan instead of the configured one
        #[arg(long)]
        folder: Option<PathBuf>,
    },

    /// Inspect the status workflow
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommands,
    },

    /// Task queries and status changes
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Epic queries
    Epic {
        #[command(subcommand)]
        command: EpicCommands,
    },

    /// Feature queries
    Feature {
        #[command(subcommand)]
        command: FeatureCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Sync
// ============================================================================

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Docs folder to scan instead of the configured one
    #[arg(long)]
    pub folder: Option<PathBuf>,

    /// How to resolve fields edited on both sides
    #[arg(long, value_enum, default_value_t)]
    pub strategy: ConflictStrategy,

    /// Report what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore the checkpoint and compare every file
    #[arg(long)]
    pub force_full_scan: bool,

    /// Create placeholder epics and features for orphaned tasks
    #[arg(long)]
    pub create_missing: bool,
}

// ============================================================================
// Workflow Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum WorkflowCommands {
    /// List statuses and their allowed transitions
    List,

    /// Validate the configured workflow
    Validate,
}

// ============================================================================
// Task Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List tasks
    List {
        /// Filter by epic key
        #[arg(long)]
        epic: Option<String>,

        /// Filter by feature key
        #[arg(long)]
        feature: Option<String>,

        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show one task
    Get {
        /// Task key (e.g. T-E01-F02-003)
        key: String,
    },

    /// Change a task's status
    SetStatus {
        /// Task key
        key: String,

        /// New status
        status: String,

        /// Skip workflow validation
        #[arg(long)]
        force: bool,
    },

    /// Show a task's status history
    History {
        /// Task key
        key: String,

        /// Maximum entries to return
        #[arg(short, long)]
        limit: Option<u32>,
    },
}

// ============================================================================
// Epic / Feature Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum EpicCommands {
    /// List epics
    List,
}

#[derive(Subcommand, Debug)]
pub enum FeatureCommands {
    /// List features
    List {
        /// Filter by epic key
        #[arg(long)]
        epic: Option<String>,
    },
}
