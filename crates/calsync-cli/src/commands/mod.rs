pub mod calendars;
pub mod common;
pub mod prefs;
pub mod push;
pub mod reconcile;
pub mod status;
pub mod sync;
pub mod toggle;
