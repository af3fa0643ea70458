//! Data models for calsync

mod agenda;
mod calendar;
mod preference;
mod sync_record;

pub use agenda::{AgendaItem, EventSummary, RsvpStatus, ServerEntity};
pub use calendar::{CalendarInfo, EventDraft, EventPatch};
pub use preference::UserCalendarPreference;
pub use sync_record::{EntityType, Platform, SyncKey, SyncRecord, SyncStatus};
