//! Database layer for calsync

mod connection;
mod migrations;
mod preference_repository;
mod sync_record_repository;

pub use connection::Database;
pub use preference_repository::{PreferenceRepository, SqlitePreferenceRepository};
pub use sync_record_repository::{SqliteSyncRecordRepository, SyncRecordRepository};
