//! Device calendar snapshots and entry payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only snapshot of a calendar on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
    pub account_name: String,
}

/// Full content of a device calendar entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA timezone name the entry should be displayed in
    pub timezone: Option<String>,
    pub location: Option<String>,
}

/// Partial update of a device calendar entry; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub location: Option<String>,
}

impl EventPatch {
    /// Apply this patch onto an existing entry.
    pub fn apply_to(&self, draft: &mut EventDraft) {
        if let Some(title) = &self.title {
            draft.title.clone_from(title);
        }
        if let Some(start) = self.start {
            draft.start = start;
        }
        if let Some(end) = self.end {
            draft.end = end;
        }
        if self.timezone.is_some() {
            draft.timezone.clone_from(&self.timezone);
        }
        if self.location.is_some() {
            draft.location.clone_from(&self.location);
        }
    }
}

impl From<&EventDraft> for EventPatch {
    fn from(draft: &EventDraft) -> Self {
        Self {
            title: Some(draft.title.clone()),
            start: Some(draft.start),
            end: Some(draft.end),
            timezone: draft.timezone.clone(),
            location: draft.location.clone(),
        }
    }
}
