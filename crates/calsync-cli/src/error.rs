use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] calsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{0} not found in agenda file {1}")]
    NotInAgenda(String, String),
    #[error("No calendar given and no preferred calendar set. Run `calsync calendars` and pass --calendar")]
    NoCalendar,
    #[error("Invalid push field '{0}', expected KEY=VALUE")]
    InvalidPushField(String),
    #[error("Push payload is empty")]
    EmptyPush,
    #[error("Nothing to change. Pass --calendar and/or --auto-sync")]
    NothingToSet,
}
