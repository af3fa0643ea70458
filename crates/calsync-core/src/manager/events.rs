//! Sync status change notifications.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{SyncKey, SyncRecord, SyncStatus};

const CHANNEL_CAPACITY: usize = 64;

/// Emitted whenever the manager persists a sync record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusChange {
    pub key: SyncKey,
    /// Status before the write; `None` for a key seen for the first time
    pub previous: Option<SyncStatus>,
    pub status: SyncStatus,
    pub calendar_event_id: Option<String>,
}

impl SyncStatusChange {
    pub(crate) fn new(previous: Option<SyncStatus>, record: &SyncRecord) -> Self {
        Self {
            key: record.key,
            previous,
            status: record.status,
            calendar_event_id: record.calendar_event_id.clone(),
        }
    }
}

pub(crate) fn channel() -> broadcast::Sender<SyncStatusChange> {
    broadcast::channel(CHANNEL_CAPACITY).0
}
