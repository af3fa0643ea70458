//! Sync record repository implementation

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{Platform, SyncKey, SyncRecord, SyncStatus};

const RECORD_COLUMNS: &str = "entity_type, entity_id, platform, calendar_event_id, calendar_id,
     status, synced_at, last_updated_at, last_server_updated_at";

/// Trait for sync record storage operations
pub trait SyncRecordRepository {
    /// Get the record for a key, including tombstones
    fn get(&self, key: &SyncKey) -> Result<Option<SyncRecord>>;

    /// Find the live record that owns a device calendar entry
    fn find_by_calendar_event_id(
        &self,
        platform: Platform,
        calendar_event_id: &str,
    ) -> Result<Option<SyncRecord>>;

    /// Insert or replace the record for its key
    fn upsert(&self, record: &SyncRecord) -> Result<()>;

    /// List every record for a platform
    fn list(&self, platform: Platform) -> Result<Vec<SyncRecord>>;

    /// List records for a platform whose status is one of `statuses`
    fn list_by_status(&self, platform: Platform, statuses: &[SyncStatus])
        -> Result<Vec<SyncRecord>>;
}

/// `SQLite` implementation of `SyncRecordRepository`
pub struct SqliteSyncRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a record from a database row
    fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncRecord> {
        let entity_type: String = row.get(0)?;
        let platform: String = row.get(2)?;
        let status: String = row.get(5)?;

        Ok(SyncRecord {
            key: SyncKey {
                entity_type: entity_type
                    .parse()
                    .map_err(|error| conversion_error(0, error))?,
                entity_id: row.get(1)?,
                platform: platform
                    .parse()
                    .map_err(|error| conversion_error(2, error))?,
            },
            calendar_event_id: row.get(3)?,
            calendar_id: row.get(4)?,
            status: status.parse().map_err(|error| conversion_error(5, error))?,
            synced_at: row.get(6)?,
            last_updated_at: row.get(7)?,
            last_server_updated_at: row.get(8)?,
        })
    }
}

fn conversion_error(column: usize, error: crate::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(error),
    )
}

impl SyncRecordRepository for SqliteSyncRecordRepository<'_> {
    fn get(&self, key: &SyncKey) -> Result<Option<SyncRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM sync_records
                     WHERE entity_type = ? AND entity_id = ? AND platform = ?"
                ),
                params![
                    key.entity_type.as_str(),
                    key.entity_id,
                    key.platform.as_str()
                ],
                Self::parse_record,
            )
            .optional()?;
        Ok(record)
    }

    fn find_by_calendar_event_id(
        &self,
        platform: Platform,
        calendar_event_id: &str,
    ) -> Result<Option<SyncRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM sync_records
                     WHERE platform = ? AND calendar_event_id = ? AND status != 'DELETED'
                     ORDER BY last_updated_at DESC
                     LIMIT 1"
                ),
                params![platform.as_str(), calendar_event_id],
                Self::parse_record,
            )
            .optional()?;
        Ok(record)
    }

    fn upsert(&self, record: &SyncRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO sync_records ({RECORD_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                record.key.entity_type.as_str(),
                record.key.entity_id,
                record.key.platform.as_str(),
                record.calendar_event_id,
                record.calendar_id,
                record.status.as_str(),
                record.synced_at,
                record.last_updated_at,
                record.last_server_updated_at,
            ],
        )?;
        Ok(())
    }

    fn list(&self, platform: Platform) -> Result<Vec<SyncRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM sync_records
             WHERE platform = ?
             ORDER BY last_updated_at DESC"
        ))?;

        let records = stmt
            .query_map(params![platform.as_str()], Self::parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    fn list_by_status(
        &self,
        platform: Platform,
        statuses: &[SyncStatus],
    ) -> Result<Vec<SyncRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM sync_records
             WHERE platform = ? AND status IN ({placeholders})
             ORDER BY last_updated_at DESC"
        ))?;

        let values = std::iter::once(platform.as_str())
            .chain(statuses.iter().copied().map(SyncStatus::as_str));
        let records = stmt
            .query_map(params_from_iter(values), Self::parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }
}
