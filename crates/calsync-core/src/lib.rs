//! calsync-core - Core library for calsync
//!
//! Keeps a device calendar consistent with server-authoritative agenda items
//! and events. User actions, push messages and foreground reconciliation all
//! feed the [`CalendarSyncManager`], which serializes work per entity and is
//! the only writer of the [`SyncRecordStore`].

pub mod config;
pub mod db;
pub mod error;
pub mod manager;
pub mod models;
pub mod policy;
pub mod provider;
pub mod push;
pub mod reconcile;
pub mod services;
pub mod util;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use manager::{CalendarSyncManager, PushOutcome, SyncStatusChange, ToggleOutcome};
pub use models::{SyncKey, SyncRecord, SyncStatus};
pub use provider::CalendarProvider;
pub use reconcile::{ReconcileReport, ReconciliationRunner, ServerAgenda};
pub use services::SyncRecordStore;
