use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "todos", version, about = "Terminal to-do lists with due dates")]
pub struct Cli {
    /// Read settings from this TOML file instead of the platform config dir
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a project todo file in the current directory
    Init,
    /// Show every list
    Lists,
    /// Create a list
    ListAdd {
        /// Name of the list
        title: String,
    },
    /// Rename a list
    ListRename {
        /// List id or exact name
        list: String,
        /// New name
        title: String,
    },
    /// Delete a list and its tasks
    ListRm {
        /// List id or exact name
        list: String,
    },
    /// Show the tasks of a list
    Tasks {
        /// List id or exact name (defaults to the first list)
        #[arg(long)]
        list: Option<String>,
        /// Show finished tasks instead of open ones
        #[arg(long)]
        done: bool,
        /// Report time remaining to the minute
        #[arg(long)]
        clock: bool,
    },
    /// Add a task
    Add {
        /// Title of the task
        title: String,
        /// List id or exact name (defaults to the first list)
        #[arg(long)]
        list: Option<String>,
        /// Longer description
        #[arg(long)]
        detail: Option<String>,
        #[command(flatten)]
        due: DueArgs,
    },
    /// Edit an existing task
    Edit {
        /// Task id
        task: String,
        /// List id or exact name (searched when omitted)
        #[arg(long)]
        list: Option<String>,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long)]
        detail: Option<String>,
        #[command(flatten)]
        due: DueArgs,
        /// Remove the due date
        #[arg(long, conflicts_with = "due")]
        clear_due: bool,
        /// Mark as done
        #[arg(long, conflicts_with = "undone")]
        done: bool,
        /// Mark as not done
        #[arg(long)]
        undone: bool,
    },
    /// Flip the done flag of a task
    Toggle {
        /// Task id
        task: String,
        /// List id or exact name (searched when omitted)
        #[arg(long)]
        list: Option<String>,
    },
    /// Delete a task
    Rm {
        /// Task id
        task: String,
        /// List id or exact name (searched when omitted)
        #[arg(long)]
        list: Option<String>,
    },
    /// Launch the interactive TUI
    Tui,
}

#[derive(Args, Debug, Default)]
pub struct DueArgs {
    /// Due date in YYYY-MM-DD format
    #[arg(long)]
    pub due: Option<String>,
    /// Time of day in HH:MM format (requires --due)
    #[arg(long, requires = "due")]
    pub at: Option<String>,
}
