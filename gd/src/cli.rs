//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Gantry - goal-driven task execution agent
#[derive(Parser)]
#[command(name = "gd", about = "Plan and execute goal-driven tasks with skills", version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plan a goal into steps without executing them
    Plan {
        /// Goal to decompose
        goal: String,
    },

    /// Run a planned task to completion
    Run {
        /// Task ID (or unique prefix)
        task_id: String,

        /// Never prompt; park steps that need approval instead
        #[arg(long)]
        non_interactive: bool,
    },

    /// Plan a goal and run it immediately
    Go {
        /// Goal to plan and execute
        goal: String,

        /// Never prompt; park steps that need approval instead
        #[arg(long)]
        non_interactive: bool,
    },

    /// Approve a step that is waiting for permission
    Approve {
        /// Task ID (or unique prefix)
        task_id: String,

        /// Step ID to approve
        step_id: String,
    },

    /// Show a task's steps and their states
    Status {
        /// Task ID (or unique prefix)
        task_id: String,
    },

    /// List all known tasks
    List,

    /// Cancel a task
    Cancel {
        /// Task ID (or unique prefix)
        task_id: String,
    },

    /// List available skills
    Skills,
}
