mod api;
mod cli;
mod commands;
mod config;
mod dialog;
mod due;
mod field;
mod focus;
mod logging;
mod model;
mod storage;
mod store;
mod ui;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config = config::Config::load(args.config.as_deref())?;
    let command = args.command.unwrap_or(cli::Command::Tui);
    let interactive = matches!(command, cli::Command::Tui);
    let _guard = logging::init(&config.log_filter, args.verbose, interactive)?;
    debug!(?command, "starting");
    match command {
        cli::Command::Init => commands::init(),
        cli::Command::Lists => commands::lists(&config),
        cli::Command::ListAdd { title } => commands::list_add(&config, title),
        cli::Command::ListRename { list, title } => commands::list_rename(&config, list, title),
        cli::Command::ListRm { list } => commands::list_rm(&config, list),
        cli::Command::Tasks { list, done, clock } => commands::tasks(&config, list, done, clock),
        cli::Command::Add {
            title,
            list,
            detail,
            due,
        } => commands::add(&config, title, list, detail, due),
        cli::Command::Edit {
            task,
            list,
            title,
            detail,
            due,
            clear_due,
            done,
            undone,
        } => commands::edit(
            &config, task, list, title, detail, due, clear_due, done, undone,
        ),
        cli::Command::Toggle { task, list } => commands::toggle(&config, task, list),
        cli::Command::Rm { task, list } => commands::rm(&config, task, list),
        cli::Command::Tui => commands::tui(&config),
    }
}
