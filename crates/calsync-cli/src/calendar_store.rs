//! JSON-file calendar store used as the desktop device calendar.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calsync_core::models::{CalendarInfo, EventDraft, EventPatch};
use calsync_core::{CalendarProvider, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

const DEFAULT_CALENDAR_ID: &str = "local";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarFile {
    #[serde(default = "default_true")]
    pub permission_granted: bool,
    #[serde(default)]
    pub calendars: Vec<CalendarInfo>,
    #[serde(default)]
    pub entries: BTreeMap<String, StoredEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredEntry {
    pub calendar_id: String,
    #[serde(flatten)]
    pub draft: EventDraft,
    pub modified_at: DateTime<Utc>,
}

const fn default_true() -> bool {
    true
}

impl Default for CalendarFile {
    fn default() -> Self {
        Self {
            permission_granted: true,
            calendars: vec![CalendarInfo {
                id: DEFAULT_CALENDAR_ID.to_string(),
                name: "Local".to_string(),
                account_name: "calsync".to_string(),
            }],
            entries: BTreeMap::new(),
        }
    }
}

/// `CalendarProvider` over a JSON document on disk.
///
/// Every call reads the file fresh so edits made by hand between runs are
/// picked up; writes are serialized within the process.
pub struct FileCalendarProvider {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCalendarProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<CalendarFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(CalendarFile::default()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(CalendarFile::default()),
            Err(error) => Err(error.into()),
        }
    }

    async fn save(&self, file: &CalendarFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_string_pretty(file)?;
        tokio::fs::write(&self.path, format!("{payload}\n")).await?;
        Ok(())
    }

    async fn modify<T>(&self, change: impl FnOnce(&mut CalendarFile) -> Result<T> + Send) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        let value = change(&mut file)?;
        self.save(&file).await?;
        Ok(value)
    }
}

#[async_trait]
impl CalendarProvider for FileCalendarProvider {
    async fn has_permission(&self) -> bool {
        match self.load().await {
            Ok(file) => file.permission_granted,
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "Calendar store unreadable");
                false
            }
        }
    }

    /// A local file has nobody to ask; the stored flag is the answer.
    async fn request_permission(&self) -> bool {
        self.has_permission().await
    }

    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>> {
        Ok(self.load().await?.calendars)
    }

    async fn create_event(&self, calendar_id: &str, draft: &EventDraft) -> Result<String> {
        let draft = draft.clone();
        let calendar_id = calendar_id.to_string();
        self.modify(move |file| {
            if !file.calendars.iter().any(|calendar| calendar.id == calendar_id) {
                return Err(Error::Provider(format!("unknown calendar '{calendar_id}'")));
            }

            let calendar_event_id = Uuid::now_v7().to_string();
            file.entries.insert(
                calendar_event_id.clone(),
                StoredEntry {
                    calendar_id,
                    draft,
                    modified_at: Utc::now(),
                },
            );
            Ok(calendar_event_id)
        })
        .await
    }

    async fn update_event(&self, calendar_event_id: &str, patch: &EventPatch) -> Result<bool> {
        let patch = patch.clone();
        self.modify(move |file| {
            Ok(match file.entries.get_mut(calendar_event_id) {
                Some(entry) => {
                    patch.apply_to(&mut entry.draft);
                    entry.modified_at = Utc::now();
                    true
                }
                None => false,
            })
        })
        .await
    }

    async fn delete_event(&self, calendar_event_id: &str) -> Result<bool> {
        self.modify(|file| Ok(file.entries.remove(calendar_event_id).is_some()))
            .await
    }
}
