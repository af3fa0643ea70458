//! Preference repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::UserCalendarPreference;
use crate::util::normalize_text_option;

const PREFERRED_CALENDAR_KEY: &str = "preferred_calendar_id";
const AUTO_SYNC_KEY: &str = "auto_sync_enabled";

/// Trait for preference storage operations
pub trait PreferenceRepository {
    /// Load preferences, falling back to defaults for missing keys
    fn load(&self) -> Result<UserCalendarPreference>;

    /// Save preferences
    fn save(&self, preference: &UserCalendarPreference) -> Result<()>;
}

/// `SQLite` implementation of `PreferenceRepository`
pub struct SqlitePreferenceRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePreferenceRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl PreferenceRepository for SqlitePreferenceRepository<'_> {
    fn load(&self) -> Result<UserCalendarPreference> {
        let defaults = UserCalendarPreference::default();

        let auto_sync_enabled = self
            .get_value(AUTO_SYNC_KEY)?
            .map_or(defaults.auto_sync_enabled, |value| {
                matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            });

        Ok(UserCalendarPreference {
            preferred_calendar_id: normalize_text_option(self.get_value(PREFERRED_CALENDAR_KEY)?),
            auto_sync_enabled,
        })
    }

    fn save(&self, preference: &UserCalendarPreference) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        match preference.preferred_calendar_id.as_deref() {
            Some(calendar_id) => {
                tx.execute(
                    "INSERT OR REPLACE INTO preferences (key, value) VALUES (?, ?)",
                    params![PREFERRED_CALENDAR_KEY, calendar_id],
                )?;
            }
            None => {
                tx.execute(
                    "DELETE FROM preferences WHERE key = ?",
                    params![PREFERRED_CALENDAR_KEY],
                )?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO preferences (key, value) VALUES (?, ?)",
            params![
                AUTO_SYNC_KEY,
                if preference.auto_sync_enabled { "true" } else { "false" }
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

impl SqlitePreferenceRepository<'_> {
    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_load_default_preferences() {
        let db = setup();
        let repo = SqlitePreferenceRepository::new(db.connection());

        let preference = repo.load().unwrap();
        assert_eq!(preference, UserCalendarPreference::default());
    }

    #[test]
    fn test_save_and_load_preferences() {
        let db = setup();
        let repo = SqlitePreferenceRepository::new(db.connection());

        let preference = UserCalendarPreference {
            preferred_calendar_id: Some("cal-1".to_string()),
            auto_sync_enabled: false,
        };
        repo.save(&preference).unwrap();
        assert_eq!(repo.load().unwrap(), preference);

        repo.save(&UserCalendarPreference::default()).unwrap();
        assert_eq!(repo.load().unwrap(), UserCalendarPreference::default());
    }

    #[test]
    fn test_blank_calendar_reads_as_unset() {
        let db = setup();
        db.connection()
            .execute(
                "INSERT INTO preferences (key, value) VALUES ('preferred_calendar_id', '  ')",
                [],
            )
            .unwrap();
        let repo = SqlitePreferenceRepository::new(db.connection());

        assert_eq!(repo.load().unwrap().preferred_calendar_id, None);
    }
}
