//! Device calendar store interface.
//!
//! Each target platform supplies one `CalendarProvider` implementation,
//! injected into the sync manager at construction. The engine only ever
//! reads back an entry's identity from the device, never its fields.

mod memory;

use async_trait::async_trait;

pub use memory::{InMemoryCalendarProvider, ProviderCall};

use crate::models::{CalendarInfo, EventDraft, EventPatch};
use crate::Result;

/// Narrow CRUD surface over the platform-native calendar store
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Whether the app currently holds calendar access
    async fn has_permission(&self) -> bool;

    /// Ask the user for calendar access; returns the resulting grant
    async fn request_permission(&self) -> bool;

    /// List writable calendars on the device
    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>>;

    /// Create an entry and return its device identifier
    async fn create_event(&self, calendar_id: &str, draft: &EventDraft) -> Result<String>;

    /// Update an entry in place; `false` when the entry no longer exists
    async fn update_event(&self, calendar_event_id: &str, patch: &EventPatch) -> Result<bool>;

    /// Delete an entry; `false` when the entry no longer exists
    async fn delete_event(&self, calendar_event_id: &str) -> Result<bool>;
}
