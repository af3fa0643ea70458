use std::path::PathBuf;

use calsync_core::models::RsvpStatus;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "calsync")]
#[command(about = "Keep a local calendar in sync with agenda items and events")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Engine config file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Sync record database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// JSON file acting as the device calendar store
    #[arg(long, global = true, value_name = "PATH")]
    pub calendar_store: Option<PathBuf>,

    /// JSON file with the current server agenda
    #[arg(long, global = true, value_name = "PATH")]
    pub agenda: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List calendars in the calendar store
    Calendars {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change calendar preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
    /// Write an agenda item (or event) to the calendar
    Sync {
        /// Agenda item ID, or event ID with --event
        id: i64,
        /// Treat the ID as an event
        #[arg(long)]
        event: bool,
        /// Target calendar (defaults to the preferred calendar)
        #[arg(long)]
        calendar: Option<String>,
    },
    /// Remove an agenda item (or event) from the calendar
    Remove {
        /// Agenda item ID, or event ID with --event
        id: i64,
        /// Treat the ID as an event
        #[arg(long)]
        event: bool,
    },
    /// Press the calendar button for an agenda item
    Toggle {
        /// Agenda item ID
        id: i64,
    },
    /// Apply an RSVP change to an agenda item
    Rsvp {
        /// Agenda item ID
        id: i64,
        /// Status before the change; a first RSVP starts from undecided
        #[arg(long, value_enum, default_value = "undecided")]
        from: RsvpArg,
        /// Status after the change
        #[arg(long, value_enum)]
        to: RsvpArg,
    },
    /// Show sync records
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply a calendar sync push payload
    Push {
        /// Payload fields as KEY=VALUE
        fields: Vec<String>,
        /// Read the payload from a JSON file instead
        #[arg(long, value_name = "PATH", conflicts_with = "fields")]
        file: Option<PathBuf>,
    },
    /// Compare synced entries with the agenda file and repair drift
    Reconcile {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Print the current preferences
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update preferences
    Set {
        /// Preferred calendar ID
        #[arg(long)]
        calendar: Option<String>,
        /// Sync automatically when RSVPing GOING
        #[arg(long)]
        auto_sync: Option<bool>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum RsvpArg {
    Going,
    NotGoing,
    Undecided,
}

impl From<RsvpArg> for RsvpStatus {
    fn from(value: RsvpArg) -> Self {
        match value {
            RsvpArg::Going => Self::Going,
            RsvpArg::NotGoing => Self::NotGoing,
            RsvpArg::Undecided => Self::Undecided,
        }
    }
}
