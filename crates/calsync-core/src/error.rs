//! Error types for calsync-core

use std::time::Duration;

use thiserror::Error;

/// Result type alias using calsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in calsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No access to the device calendar store
    #[error("Calendar permission denied")]
    PermissionDenied,

    /// Device calendar store I/O failure
    #[error("Calendar provider error: {0}")]
    Provider(String),

    /// Device calendar store did not answer in time
    #[error("Calendar provider timed out after {0:?}")]
    Timeout(Duration),

    /// Referenced record or entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A detached sync task panicked or was aborted
    #[error("Sync task failed: {0}")]
    Task(String),
}

impl Error {
    /// Provider failures are recorded on the sync record and retried later.
    pub const fn is_provider_failure(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Timeout(_))
    }
}
