//! Thread-safe async facade over the sync record database.
//!
//! Every call runs on tokio's blocking pool so SQLite I/O never stalls the
//! async workers. Mutating calls are crate-private: only the sync manager
//! writes records or preferences.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::db::{
    Database, PreferenceRepository, SqlitePreferenceRepository, SqliteSyncRecordRepository,
    SyncRecordRepository,
};
use crate::models::{Platform, SyncKey, SyncRecord, SyncStatus, UserCalendarPreference};
use crate::{Error, Result};

/// Durable mapping from sync keys to device calendar entries, plus preferences.
#[derive(Clone)]
pub struct SyncRecordStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl SyncRecordStore {
    /// Open a store backed by the database file at `db_path`.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let open_path = db_path.clone();
        let db = tokio::task::spawn_blocking(move || {
            if let Some(parent) = open_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Database::open(open_path)
        })
        .await
        .map_err(|error| Error::Task(error.to_string()))??;

        tracing::debug!(path = %db_path.display(), "Opened sync record store");
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing database file, if any.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    async fn with_db<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| Error::Database("sync record store lock poisoned".to_string()))?;
            operation(&guard)
        })
        .await
        .map_err(|error| Error::Task(error.to_string()))?
    }

    pub async fn get(&self, key: SyncKey) -> Result<Option<SyncRecord>> {
        self.with_db(move |db| SqliteSyncRecordRepository::new(db.connection()).get(&key))
            .await
    }

    /// Reverse lookup of the live record owning a device calendar entry.
    pub async fn find_by_calendar_event_id(
        &self,
        platform: Platform,
        calendar_event_id: &str,
    ) -> Result<Option<SyncRecord>> {
        let calendar_event_id = calendar_event_id.to_string();
        self.with_db(move |db| {
            SqliteSyncRecordRepository::new(db.connection())
                .find_by_calendar_event_id(platform, &calendar_event_id)
        })
        .await
    }

    pub async fn list(&self, platform: Platform) -> Result<Vec<SyncRecord>> {
        self.with_db(move |db| SqliteSyncRecordRepository::new(db.connection()).list(platform))
            .await
    }

    pub async fn list_by_status(
        &self,
        platform: Platform,
        statuses: &[SyncStatus],
    ) -> Result<Vec<SyncRecord>> {
        let statuses = statuses.to_vec();
        self.with_db(move |db| {
            SqliteSyncRecordRepository::new(db.connection()).list_by_status(platform, &statuses)
        })
        .await
    }

    pub async fn load_preferences(&self) -> Result<UserCalendarPreference> {
        self.with_db(|db| SqlitePreferenceRepository::new(db.connection()).load())
            .await
    }

    pub(crate) async fn save(&self, record: SyncRecord) -> Result<()> {
        self.with_db(move |db| SqliteSyncRecordRepository::new(db.connection()).upsert(&record))
            .await
    }

    pub(crate) async fn save_preferences(&self, preference: UserCalendarPreference) -> Result<()> {
        self.with_db(move |db| SqlitePreferenceRepository::new(db.connection()).save(&preference))
            .await
    }

    #[cfg(test)]
    pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
        self.with_db(move |db| Ok(db.connection().execute_batch(sql)?))
            .await
    }
}
