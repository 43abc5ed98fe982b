use anyhow::Result;
use clap::Parser;
use dayplan::cli::{Cli, Command};
use dayplan::commands::{self, Paths};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Opt-in via RUST_LOG; an unparsable filter leaves logging off.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let args = Cli::parse();
    let paths = Paths {
        store: args.store,
        config: args.config,
    };
    let command = args.command.unwrap_or(Command::Tui);
    match command {
        Command::Init => commands::init(),
        Command::List { date } => commands::list(&paths, date),
        Command::Add { text, date } => commands::add(&paths, text.join(" "), date),
        Command::Done { id, date } => commands::toggle_done(&paths, id, date),
        Command::Prio { id, date } => commands::toggle_priority(&paths, id, date),
        Command::Delete { id, date } => commands::delete(&paths, id, date),
        Command::Month { year, month } => commands::month(&paths, year, month),
        Command::Tui => commands::tui(&paths),
    }
}
