//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tp_core::{Priority, TaskStatus};

/// Task time tracker.
///
/// Starts and stops timers against tasks and reports completion rates,
/// time distribution and day-over-day streaks.
#[derive(Debug, Parser)]
#[command(name = "tp", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage tasks.
    #[command(subcommand)]
    Task(TaskAction),

    /// Start a timer on a task.
    Start {
        /// The task ID.
        task_id: String,
    },

    /// Stop the running timer on a task.
    Stop {
        /// The task ID.
        task_id: String,
    },

    /// List time entries for a task, newest first.
    Entries {
        /// The task ID.
        task_id: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show tracked time in a date range.
    Report {
        #[command(flatten)]
        range: RangeArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show productivity statistics.
    #[command(subcommand)]
    Stats(StatsKind),
}

/// Task management actions.
#[derive(Debug, Subcommand)]
pub enum TaskAction {
    /// Create a task.
    Add {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// low, medium or high.
        #[arg(long, default_value = "medium")]
        priority: Priority,

        /// Due date (ISO 8601 or YYYY-MM-DD).
        #[arg(long)]
        due: Option<String>,
    },

    /// List tasks.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Change a task's status.
    Status {
        task_id: String,

        /// pending, in_progress or completed.
        status: TaskStatus,
    },

    /// Edit task fields.
    Edit {
        task_id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        priority: Option<Priority>,

        #[arg(long)]
        due: Option<String>,
    },

    /// Delete a task and its time entries.
    Rm { task_id: String },
}

/// Statistics reports.
#[derive(Debug, Subcommand)]
pub enum StatsKind {
    /// Task counts and completion rates.
    Tasks {
        #[command(flatten)]
        range: RangeArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Tracked time by priority and weekday.
    Time {
        #[command(flatten)]
        range: RangeArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Completions per day and streaks.
    Productivity {
        #[command(flatten)]
        range: RangeArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Optional date range shared by the report commands.
#[derive(Debug, Clone, Default, Args)]
pub struct RangeArgs {
    /// Range start (ISO 8601, YYYY-MM-DD, or e.g. '7 days ago').
    #[arg(long = "start")]
    pub start_date: Option<String>,

    /// Range end (ISO 8601, YYYY-MM-DD, or e.g. '1 hour ago').
    #[arg(long = "end")]
    pub end_date: Option<String>,
}
