//! calsync CLI - Drive the calendar sync engine from a terminal
//!
//! Uses a JSON file as the device calendar and another as the server
//! agenda, so the whole sync lifecycle can be exercised on a desktop.

mod agenda_file;
mod calendar_store;
mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands, PrefsAction};
use crate::commands::calendars::run_calendars;
use crate::commands::common::{open_engine, resolve_paths};
use crate::commands::prefs::{run_prefs_set, run_prefs_show};
use crate::commands::push::run_push;
use crate::commands::reconcile::run_reconcile;
use crate::commands::status::run_status;
use crate::commands::sync::{run_remove, run_sync};
use crate::commands::toggle::{run_rsvp, run_toggle};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "calsync=info"
        .parse::<tracing_subscriber::filter::Directive>()
        .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = resolve_paths(cli.config, cli.db_path, cli.calendar_store, cli.agenda)?;
    let engine = open_engine(&paths).await?;

    match cli.command {
        Commands::Calendars { json } => run_calendars(&engine, json).await?,
        Commands::Prefs { action } => match action {
            PrefsAction::Show { json } => run_prefs_show(&engine, json).await?,
            PrefsAction::Set {
                calendar,
                auto_sync,
            } => run_prefs_set(&engine, calendar.as_deref(), auto_sync).await?,
        },
        Commands::Sync {
            id,
            event,
            calendar,
        } => {
            run_sync(&engine, id, event, calendar.as_deref()).await?;
        }
        Commands::Remove { id, event } => run_remove(&engine, id, event).await?,
        Commands::Toggle { id } => {
            run_toggle(&engine, id).await?;
        }
        Commands::Rsvp { id, from, to } => {
            run_rsvp(&engine, id, from.into(), to.into()).await?;
        }
        Commands::Status { json } => run_status(&engine, json).await?,
        Commands::Push { fields, file } => {
            run_push(&engine, &fields, file.as_deref()).await?;
        }
        Commands::Reconcile { json } => {
            run_reconcile(&engine, json).await?;
        }
    }

    Ok(())
}
