use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io::Write;
use std::path::PathBuf;

use crate::models::{FilterMode, Priority};

#[derive(Parser)]
#[command(author, version, about = "A personal task list", long_about = None)]
pub struct Cli {
    /// Database file (defaults to ~/.tasklist.db)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a task
    Add {
        #[arg(value_name = "TEXT")]
        text: String,
        /// Due date as YYYY-MM-DD
        #[arg(short, long, value_name = "DATE")]
        due: Option<String>,
        /// high, medium or low
        #[arg(short, long, value_name = "PRIORITY")]
        priority: Option<Priority>,
    },
    /// Print the task list
    List {
        /// all, active or completed
        #[arg(short, long, value_name = "MODE")]
        filter: Option<FilterMode>,
        /// Case-insensitive text search
        #[arg(short, long, value_name = "TERM")]
        search: Option<String>,
    },
    /// Flip a task between active and completed
    Toggle {
        /// Position shown by `list`
        #[arg(value_name = "N")]
        number: usize,
    },
    /// Replace a task's text, due date and priority
    Edit {
        #[arg(value_name = "N")]
        number: usize,
        #[arg(value_name = "TEXT")]
        text: String,
        #[arg(short, long, value_name = "DATE")]
        due: Option<String>,
        #[arg(short, long, value_name = "PRIORITY")]
        priority: Option<Priority>,
    },
    /// Delete a task
    Delete {
        #[arg(value_name = "N")]
        number: usize,
    },
    /// Remove every completed task
    ClearCompleted,
    /// Reset all data (WARNING: Deletes all tasks)
    Reset,
    /// Set a config value
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
    /// Get a config value
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// List all config values
    ConfigList,
    /// Delete a config value
    ConfigDelete {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// Print shell completions
    Completions {
        #[arg(value_name = "SHELL")]
        shell: String,
    },
    /// Launch TUI interface
    Tui,
}

/// Writes the completion script for `shell` to `out`. Returns `false` for a
/// shell clap_complete does not know.
pub fn write_completions(shell: &str, out: &mut dyn Write) -> bool {
    let shell = match shell.to_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        "elvish" => Shell::Elvish,
        "powershell" => Shell::PowerShell,
        _ => return false,
    };
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "tasklist", out);
    true
}
