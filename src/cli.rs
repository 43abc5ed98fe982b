use crate::model::{DateKey, TaskId};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dayplan", version, about = "Per-day task ledger with a terminal calendar")]
pub struct Cli {
    /// Task store file (overrides config and project discovery)
    #[arg(long, global = true, env = "DAYPLAN_STORE")]
    pub store: Option<PathBuf>,
    /// Config file (defaults to config.yml in the user config directory)
    #[arg(long, global = true, env = "DAYPLAN_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a project task store in the current directory
    Init,
    /// List a day's tasks in display order
    List {
        /// Day in YYYY-MM-DD format (defaults to today)
        #[arg(long, short = 'd')]
        date: Option<DateKey>,
    },
    /// Add a task to a day
    Add {
        /// Task text
        #[arg(required = true)]
        text: Vec<String>,
        /// Day in YYYY-MM-DD format (defaults to today)
        #[arg(long, short = 'd')]
        date: Option<DateKey>,
    },
    /// Toggle a task between open and done
    Done {
        /// Task id
        id: TaskId,
        /// Day in YYYY-MM-DD format (defaults to today)
        #[arg(long, short = 'd')]
        date: Option<DateKey>,
    },
    /// Toggle a task's priority flag
    Prio {
        /// Task id
        id: TaskId,
        /// Day in YYYY-MM-DD format (defaults to today)
        #[arg(long, short = 'd')]
        date: Option<DateKey>,
    },
    /// Delete a task
    Delete {
        /// Task id
        id: TaskId,
        /// Day in YYYY-MM-DD format (defaults to today)
        #[arg(long, short = 'd')]
        date: Option<DateKey>,
    },
    /// Print a month grid marking days that have tasks
    Month {
        /// Year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
        /// Month 1-12 (defaults to the current month)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
    },
    /// Launch the interactive TUI
    Tui,
}
