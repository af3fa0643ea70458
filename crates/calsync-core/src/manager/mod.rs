//! Calendar sync orchestration.
//!
//! `CalendarSyncManager` is the single entry point for user actions, push
//! commands and reconciliation, and the only writer of sync records. Work on
//! one sync key is serialized in arrival order. Every operation runs on its
//! own task from the moment it is called, so dropping the caller's future
//! only drops the observation of the result.

mod events;
mod locks;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex as AsyncMutex};

pub use events::SyncStatusChange;
use locks::KeyedLocks;

use crate::config::EngineConfig;
use crate::models::{
    AgendaItem, CalendarInfo, EntityType, EventPatch, EventSummary, Platform, RsvpStatus,
    ServerEntity, SyncKey, SyncRecord, SyncStatus, UserCalendarPreference,
};
use crate::policy::{self, AutoSyncAction, AutoSyncContext, RsvpEdgeTracker};
use crate::provider::CalendarProvider;
use crate::push::{self, SyncCommand};
use crate::services::SyncRecordStore;
use crate::util::{normalize_text_option, unix_millis_now};
use crate::{Error, Result};

/// Result of a calendar button press
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Synced(SyncRecord),
    Removed,
    /// No preferred calendar yet; the user has to pick one of these
    CalendarSelectionRequired(Vec<CalendarInfo>),
}

/// What a push command did on this device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushOutcome {
    /// Number of sync records the command changed
    Applied(usize),
    /// Nothing on this device corresponds to the command
    Skipped,
    /// The device store rejected the command; record status reflects it
    Failed,
    /// The payload could not be decoded
    Dropped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkDeleteSummary {
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BulkDeleteSummary {
    pub const fn outcome(self) -> PushOutcome {
        if self.deleted > 0 {
            PushOutcome::Applied(self.deleted)
        } else if self.failed > 0 {
            PushOutcome::Failed
        } else {
            PushOutcome::Skipped
        }
    }
}

/// Result of re-applying server state to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairOutcome {
    /// The device entry already reflects the server copy
    UpToDate,
    Updated,
    /// The device entry was gone; the record is back to NOT_SYNCED
    EntryMissing,
    /// The record is not eligible for repair
    Skipped,
}

/// Orchestrates every write to the device calendar and the sync record store.
#[derive(Clone)]
pub struct CalendarSyncManager {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn CalendarProvider>,
    store: SyncRecordStore,
    platform: Platform,
    provider_timeout: Duration,
    locks: KeyedLocks,
    preferences: AsyncMutex<()>,
    rsvp: Mutex<RsvpEdgeTracker>,
    events: broadcast::Sender<SyncStatusChange>,
}

impl CalendarSyncManager {
    pub fn new(
        provider: Arc<dyn CalendarProvider>,
        store: SyncRecordStore,
        config: &EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                store,
                platform: config.platform,
                provider_timeout: config.provider_timeout(),
                locks: KeyedLocks::new(),
                preferences: AsyncMutex::new(()),
                rsvp: Mutex::new(RsvpEdgeTracker::new()),
                events: events::channel(),
            }),
        }
    }

    pub fn platform(&self) -> Platform {
        self.inner.platform
    }

    /// Read access to the record store; writes go through the manager.
    pub fn store(&self) -> &SyncRecordStore {
        &self.inner.store
    }

    /// Receive a [`SyncStatusChange`] for every persisted record write.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncStatusChange> {
        self.inner.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // User-initiated sync
    // -----------------------------------------------------------------------

    /// Create or update the device entry for an agenda item.
    pub async fn sync_agenda_item_to_calendar(
        &self,
        item: &AgendaItem,
        event_name: &str,
        calendar_id: &str,
    ) -> Result<SyncRecord> {
        self.sync_entity(ServerEntity::from_agenda_item(item, event_name), calendar_id)
            .await
    }

    pub async fn sync_event_to_calendar(
        &self,
        event: &EventSummary,
        calendar_id: &str,
    ) -> Result<SyncRecord> {
        self.sync_entity(ServerEntity::from_event(event), calendar_id)
            .await
    }

    /// Create or update the device entry for any server entity.
    ///
    /// On a provider failure the record is left in ERROR with the id of any
    /// entry still on the device, so a retry updates instead of duplicating.
    pub async fn sync_entity(&self, entity: ServerEntity, calendar_id: &str) -> Result<SyncRecord> {
        let calendar_id = normalize_text_option(Some(calendar_id.to_string()))
            .ok_or_else(|| Error::InvalidInput("calendar id must not be empty".to_string()))?;
        let key = self.key(entity.entity_type, entity.entity_id);

        self.serialized(key, move |inner| async move {
            inner.sync_locked(entity, calendar_id).await
        })
        .await
    }

    /// Remove an agenda item's device entry. Succeeds without provider calls
    /// when nothing is synced.
    pub async fn remove_agenda_item_from_calendar(&self, agenda_item_id: i64) -> Result<()> {
        self.remove_entity(self.key(EntityType::AgendaItem, agenda_item_id))
            .await
    }

    pub async fn remove_event_from_calendar(&self, event_id: i64) -> Result<()> {
        self.remove_entity(self.key(EntityType::Event, event_id))
            .await
    }

    async fn remove_entity(&self, key: SyncKey) -> Result<()> {
        self.serialized(key, move |inner| async move {
            inner.remove_locked(key).await.map(|_| ())
        })
        .await
    }

    pub async fn is_agenda_item_synced(&self, agenda_item_id: i64) -> Result<bool> {
        self.is_synced(self.key(EntityType::AgendaItem, agenda_item_id))
            .await
    }

    pub async fn is_event_synced(&self, event_id: i64) -> Result<bool> {
        self.is_synced(self.key(EntityType::Event, event_id)).await
    }

    async fn is_synced(&self, key: SyncKey) -> Result<bool> {
        Ok(self
            .inner
            .store
            .get(key)
            .await?
            .is_some_and(|record| record.is_synced()))
    }

    pub async fn sync_record(
        &self,
        entity_type: EntityType,
        entity_id: i64,
    ) -> Result<Option<SyncRecord>> {
        self.inner.store.get(self.key(entity_type, entity_id)).await
    }

    /// Every record on this platform, most recently touched first.
    pub async fn sync_records(&self) -> Result<Vec<SyncRecord>> {
        self.inner.store.list(self.inner.platform).await
    }

    /// Calendar button: remove when synced, otherwise sync into the
    /// preferred calendar. Permission is requested once when missing.
    pub async fn toggle_agenda_item(
        &self,
        item: &AgendaItem,
        event_name: &str,
    ) -> Result<ToggleOutcome> {
        if !self.inner.permission_granted().await && !self.request_calendar_permission().await {
            return Err(Error::PermissionDenied);
        }

        let entity = ServerEntity::from_agenda_item(item, event_name);
        let key = self.key(EntityType::AgendaItem, item.id);
        self.serialized(key, move |inner| async move {
            let synced = inner
                .store
                .get(key)
                .await?
                .is_some_and(|record| record.is_synced());
            if synced {
                inner.remove_locked(key).await?;
                return Ok(ToggleOutcome::Removed);
            }

            match inner.store.load_preferences().await?.preferred_calendar_id {
                Some(calendar_id) => inner
                    .sync_locked(entity, calendar_id)
                    .await
                    .map(ToggleOutcome::Synced),
                None => inner
                    .calendars()
                    .await
                    .map(ToggleOutcome::CalendarSelectionRequired),
            }
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Calendars and preferences
    // -----------------------------------------------------------------------

    pub async fn has_calendar_permission(&self) -> bool {
        self.inner.permission_granted().await
    }

    pub async fn request_calendar_permission(&self) -> bool {
        let timeout = self.inner.provider_timeout;
        if let Ok(granted) = tokio::time::timeout(timeout, self.inner.provider.request_permission()).await {
            tracing::info!(granted, "Calendar permission requested");
            granted
        } else {
            tracing::warn!(?timeout, "Calendar permission request timed out");
            false
        }
    }

    /// Writable calendars on the device, or `PermissionDenied`.
    pub async fn get_available_calendars(&self) -> Result<Vec<CalendarInfo>> {
        self.inner.calendars().await
    }

    pub async fn preferences(&self) -> Result<UserCalendarPreference> {
        self.inner.store.load_preferences().await
    }

    pub async fn get_preferred_calendar_id(&self) -> Result<Option<String>> {
        Ok(self.preferences().await?.preferred_calendar_id)
    }

    pub async fn set_preferred_calendar(&self, calendar_id: &str) -> Result<()> {
        let calendar_id = normalize_text_option(Some(calendar_id.to_string()))
            .ok_or_else(|| Error::InvalidInput("calendar id must not be empty".to_string()))?;

        self.inner
            .update_preferences(|preferences| {
                preferences.preferred_calendar_id = Some(calendar_id.clone());
            })
            .await?;
        tracing::info!(%calendar_id, "Preferred calendar set");
        Ok(())
    }

    pub async fn set_auto_sync_enabled(&self, enabled: bool) -> Result<()> {
        self.inner
            .update_preferences(|preferences| preferences.auto_sync_enabled = enabled)
            .await?;
        tracing::info!(enabled, "Auto-sync preference changed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // RSVP-driven auto-sync
    // -----------------------------------------------------------------------

    /// Apply the auto-sync decision for an explicit RSVP transition.
    ///
    /// Preferences, permission and record state are read while holding the
    /// item's key, so the decision and its action see the same state.
    pub async fn handle_rsvp_change(
        &self,
        item: &AgendaItem,
        event_name: &str,
        previous: Option<RsvpStatus>,
        new: RsvpStatus,
    ) -> Result<AutoSyncAction> {
        if previous == Some(new) {
            return Ok(AutoSyncAction::None);
        }

        let entity = ServerEntity::from_agenda_item(item, event_name);
        let key = self.key(EntityType::AgendaItem, item.id);
        self.serialized(key, move |inner| async move {
            let preferences = inner.store.load_preferences().await?;
            let is_synced = inner
                .store
                .get(key)
                .await?
                .is_some_and(|record| record.is_synced());
            let context = AutoSyncContext {
                auto_sync_enabled: preferences.auto_sync_enabled,
                has_preferred_calendar: preferences.has_preferred_calendar(),
                has_permission: inner.permission_granted().await,
                is_synced,
            };

            let action = policy::decide(previous, new, context);
            tracing::debug!(%key, ?previous, %new, ?action, "Evaluated RSVP change");
            match (action, preferences.preferred_calendar_id) {
                (AutoSyncAction::Sync, Some(calendar_id)) => {
                    inner.sync_locked(entity, calendar_id).await?;
                }
                (AutoSyncAction::Unsync, _) => {
                    inner.remove_locked(key).await?;
                }
                _ => {}
            }
            Ok(action)
        })
        .await
    }

    /// Feed the latest RSVP status of an item; repeats of the last observed
    /// status are ignored.
    pub async fn observe_rsvp(
        &self,
        item: &AgendaItem,
        event_name: &str,
        status: RsvpStatus,
    ) -> Result<AutoSyncAction> {
        let transition = self
            .inner
            .rsvp
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(item.id, status);

        match transition {
            Some(transition) => {
                self.handle_rsvp_change(item, event_name, transition.previous, transition.current)
                    .await
            }
            None => Ok(AutoSyncAction::None),
        }
    }

    // -----------------------------------------------------------------------
    // Push-driven commands
    // -----------------------------------------------------------------------

    /// Decode and apply a push payload. Failures are logged, never returned.
    pub async fn handle_push(&self, data: &HashMap<String, String>) -> PushOutcome {
        if !push::is_calendar_sync(data) {
            tracing::debug!(message_type = ?data.get("type"), "Ignoring non-calendar push");
            return PushOutcome::Skipped;
        }

        let decoded = match push::decode(data) {
            Ok(decoded) => decoded,
            Err(error) => {
                tracing::warn!(%error, "Dropping calendar sync push");
                return PushOutcome::Dropped;
            }
        };

        let message_type = decoded.message.message_type();
        // TODO: acknowledge queue_id to the server once it accepts delivery receipts
        tracing::info!(message_type, queue_id = ?decoded.queue_id, "Applying calendar sync push");

        let outcome = self.apply_command(decoded.message.into_command()).await;
        tracing::debug!(message_type, ?outcome, "Calendar sync push handled");
        outcome
    }

    pub async fn apply_command(&self, command: SyncCommand) -> PushOutcome {
        let patch = command.patch().unwrap_or_default();
        match command {
            SyncCommand::Delete { calendar_event_id } => push_outcome(
                &calendar_event_id,
                self.delete_by_calendar_event_id(&calendar_event_id).await,
            ),
            SyncCommand::Update {
                calendar_event_id, ..
            } => push_outcome(
                &calendar_event_id,
                self.update_calendar_event_from_payload(&calendar_event_id, patch)
                    .await,
            ),
            SyncCommand::BulkDelete { calendar_event_ids } => self
                .delete_multiple_by_calendar_event_ids(&calendar_event_ids)
                .await
                .outcome(),
        }
    }

    /// Delete the entry a push refers to. `Ok(false)` when no live record
    /// owns `calendar_event_id`.
    pub async fn delete_by_calendar_event_id(&self, calendar_event_id: &str) -> Result<bool> {
        let manager = self.clone();
        let calendar_event_id = calendar_event_id.trim().to_string();
        detached(async move { manager.delete_located(calendar_event_id).await }).await
    }

    async fn delete_located(&self, calendar_event_id: String) -> Result<bool> {
        let Some(key) = self.inner.locate(&calendar_event_id).await? else {
            tracing::debug!(%calendar_event_id, "No sync record for pushed delete");
            return Ok(false);
        };

        self.serialized(key, move |inner| async move {
            if inner.owned_record(key, &calendar_event_id).await?.is_none() {
                return Ok(false);
            }
            inner.remove_locked(key).await
        })
        .await
    }

    pub async fn delete_multiple_by_calendar_event_ids(
        &self,
        calendar_event_ids: &[String],
    ) -> BulkDeleteSummary {
        let mut summary = BulkDeleteSummary::default();
        for calendar_event_id in calendar_event_ids {
            match self.delete_by_calendar_event_id(calendar_event_id).await {
                Ok(true) => summary.deleted += 1,
                Ok(false) => summary.skipped += 1,
                Err(error) => {
                    tracing::warn!(%calendar_event_id, %error, "Bulk delete entry failed");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Apply pushed server fields to an entry the user already synced.
    ///
    /// Returns `Ok(false)` and creates nothing when no live record owns the
    /// entry. A failed update leaves the record in NEEDS_UPDATE.
    pub async fn update_calendar_event_from_payload(
        &self,
        calendar_event_id: &str,
        patch: EventPatch,
    ) -> Result<bool> {
        let manager = self.clone();
        let calendar_event_id = calendar_event_id.trim().to_string();
        detached(async move { manager.update_located(calendar_event_id, patch).await }).await
    }

    async fn update_located(&self, calendar_event_id: String, patch: EventPatch) -> Result<bool> {
        let Some(key) = self.inner.locate(&calendar_event_id).await? else {
            tracing::debug!(%calendar_event_id, "No sync record for pushed update");
            return Ok(false);
        };

        self.serialized(key, move |inner| async move {
            inner.update_locked(key, &calendar_event_id, &patch).await
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Re-apply the current server copy of an entity to its device entry
    /// when the record is stale or marked NEEDS_UPDATE.
    pub async fn repair_from_server(&self, entity: ServerEntity) -> Result<RepairOutcome> {
        let key = self.key(entity.entity_type, entity.entity_id);
        self.serialized(key, move |inner| async move {
            inner.repair_locked(key, &entity).await
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Private
    // -----------------------------------------------------------------------

    fn key(&self, entity_type: EntityType, entity_id: i64) -> SyncKey {
        SyncKey::new(entity_type, entity_id, self.inner.platform)
    }

    /// Run `operation` with exclusive access to `key` on a detached task.
    ///
    /// The queue position is taken before the first await, so calls on one
    /// key run in the order they were made even if a caller goes away.
    async fn serialized<T, F, Fut>(&self, key: SyncKey, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<Inner>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let ticket = self.inner.locks.enqueue(key);
        let inner = Arc::clone(&self.inner);
        detached(async move {
            let _guard = ticket.acquire().await;
            operation(inner).await
        })
        .await
    }
}

/// Spawn `work` so that dropping the returned future leaves it running.
async fn detached<T, Fut>(work: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|error| Error::Task(error.to_string()))?
}

fn push_outcome(calendar_event_id: &str, result: Result<bool>) -> PushOutcome {
    match result {
        Ok(true) => PushOutcome::Applied(1),
        Ok(false) => PushOutcome::Skipped,
        Err(error) => {
            tracing::warn!(calendar_event_id, %error, "Push command failed");
            PushOutcome::Failed
        }
    }
}

impl Inner {
    async fn provider_call<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.provider_timeout, call)
            .await
            .map_err(|_| Error::Timeout(self.provider_timeout))?
    }

    async fn permission_granted(&self) -> bool {
        if let Ok(granted) =
            tokio::time::timeout(self.provider_timeout, self.provider.has_permission()).await
        {
            granted
        } else {
            tracing::warn!(timeout = ?self.provider_timeout, "Calendar permission check timed out");
            false
        }
    }

    async fn calendars(&self) -> Result<Vec<CalendarInfo>> {
        if !self.permission_granted().await {
            return Err(Error::PermissionDenied);
        }
        self.provider_call(self.provider.list_calendars()).await
    }

    async fn update_preferences(
        &self,
        change: impl FnOnce(&mut UserCalendarPreference) + Send,
    ) -> Result<UserCalendarPreference> {
        let _guard = self.preferences.lock().await;
        let mut preferences = self.store.load_preferences().await?;
        change(&mut preferences);
        self.store.save_preferences(preferences.clone()).await?;
        Ok(preferences)
    }

    /// The first calendar the user syncs into becomes the preferred one.
    async fn remember_calendar(&self, calendar_id: &str) -> Result<()> {
        let _guard = self.preferences.lock().await;
        let mut preferences = self.store.load_preferences().await?;
        if preferences.has_preferred_calendar() {
            return Ok(());
        }

        preferences.preferred_calendar_id = Some(calendar_id.to_string());
        self.store.save_preferences(preferences).await?;
        tracing::info!(calendar_id, "Stored first synced calendar as preferred");
        Ok(())
    }

    async fn persist(&self, record: &mut SyncRecord, previous: Option<SyncStatus>) -> Result<()> {
        record.last_updated_at = unix_millis_now();
        self.store.save(record.clone()).await?;
        // No subscribers is not an error
        self.events
            .send(SyncStatusChange::new(previous, record))
            .ok();
        Ok(())
    }

    async fn locate(&self, calendar_event_id: &str) -> Result<Option<SyncKey>> {
        Ok(self
            .store
            .find_by_calendar_event_id(self.platform, calendar_event_id)
            .await?
            .map(|record| record.key))
    }

    /// Re-read under the key lock; the reverse lookup ran without it.
    async fn owned_record(
        &self,
        key: SyncKey,
        calendar_event_id: &str,
    ) -> Result<Option<SyncRecord>> {
        Ok(self.store.get(key).await?.filter(|record| {
            record.is_active() && record.calendar_event_id.as_deref() == Some(calendar_event_id)
        }))
    }

    async fn sync_locked(&self, entity: ServerEntity, calendar_id: String) -> Result<SyncRecord> {
        let key = SyncKey::new(entity.entity_type, entity.entity_id, self.platform);
        if !self.permission_granted().await {
            return Err(Error::PermissionDenied);
        }

        let existing = self.store.get(key).await?;
        let previous = existing.as_ref().map(|record| record.status);
        let mut record = existing
            .filter(SyncRecord::is_active)
            .unwrap_or_else(|| SyncRecord::new(key, unix_millis_now()));

        match self.write_entry(&mut record, &entity, &calendar_id).await {
            Ok(()) => {
                record.status = SyncStatus::Synced;
                record.synced_at = Some(unix_millis_now());
                record.last_server_updated_at = Some(entity.updated_at);
                self.persist(&mut record, previous).await?;
                if let Err(error) = self.remember_calendar(&calendar_id).await {
                    tracing::warn!(%calendar_id, %error, "Could not store preferred calendar");
                }
                tracing::info!(
                    %key,
                    %calendar_id,
                    calendar_event_id = ?record.calendar_event_id,
                    "Synced to device calendar"
                );
                Ok(record)
            }
            Err(error) if error.is_provider_failure() => {
                record.status = SyncStatus::Error;
                self.persist(&mut record, previous).await?;
                tracing::warn!(%key, %error, "Device calendar sync failed");
                Err(error)
            }
            Err(error) => Err(error),
        }
    }

    /// Create or update the device entry and point `record` at it.
    async fn write_entry(
        &self,
        record: &mut SyncRecord,
        entity: &ServerEntity,
        calendar_id: &str,
    ) -> Result<()> {
        if let Some(calendar_event_id) = record.calendar_event_id.clone() {
            let same_calendar = record
                .calendar_id
                .as_deref()
                .map_or(true, |current| current == calendar_id);

            if same_calendar {
                let patch = EventPatch::from(&entity.draft);
                if self
                    .provider_call(self.provider.update_event(&calendar_event_id, &patch))
                    .await?
                {
                    record.calendar_id = Some(calendar_id.to_string());
                    return Ok(());
                }
                tracing::debug!(
                    key = %record.key,
                    %calendar_event_id,
                    "Device entry missing, recreating"
                );
            } else {
                self.provider_call(self.provider.delete_event(&calendar_event_id))
                    .await?;
                record.calendar_event_id = None;
                tracing::debug!(
                    key = %record.key,
                    from = ?record.calendar_id,
                    to = calendar_id,
                    "Moving entry to another calendar"
                );
            }
        }

        let calendar_event_id = self
            .provider_call(self.provider.create_event(calendar_id, &entity.draft))
            .await?;
        record.calendar_event_id = Some(calendar_event_id);
        record.calendar_id = Some(calendar_id.to_string());
        Ok(())
    }

    /// Returns whether a live record was retired.
    async fn remove_locked(&self, key: SyncKey) -> Result<bool> {
        let Some(mut record) = self.store.get(key).await?.filter(SyncRecord::is_active) else {
            tracing::debug!(%key, "Nothing to remove");
            return Ok(false);
        };
        let previous = Some(record.status);

        if let Some(calendar_event_id) = record.calendar_event_id.clone() {
            if !self.permission_granted().await {
                return Err(Error::PermissionDenied);
            }

            match self
                .provider_call(self.provider.delete_event(&calendar_event_id))
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(%key, %calendar_event_id, "Device entry was already gone");
                }
                Err(error) if error.is_provider_failure() => {
                    record.status = SyncStatus::Error;
                    self.persist(&mut record, previous).await?;
                    tracing::warn!(%key, %error, "Device calendar delete failed");
                    return Err(error);
                }
                Err(error) => return Err(error),
            }
        }

        record.status = SyncStatus::Deleted;
        record.calendar_event_id = None;
        self.persist(&mut record, previous).await?;
        tracing::info!(%key, "Removed from device calendar");
        Ok(true)
    }

    async fn update_locked(
        &self,
        key: SyncKey,
        calendar_event_id: &str,
        patch: &EventPatch,
    ) -> Result<bool> {
        let Some(mut record) = self.owned_record(key, calendar_event_id).await? else {
            return Ok(false);
        };
        let previous = Some(record.status);

        let result = if self.permission_granted().await {
            self.provider_call(self.provider.update_event(calendar_event_id, patch))
                .await
                .and_then(|updated| {
                    if updated {
                        Ok(())
                    } else {
                        Err(Error::NotFound(format!(
                            "device calendar entry '{calendar_event_id}'"
                        )))
                    }
                })
        } else {
            Err(Error::PermissionDenied)
        };

        match result {
            Ok(()) => {
                let now = unix_millis_now();
                record.status = SyncStatus::Synced;
                record.synced_at = Some(now);
                record.last_server_updated_at = Some(now);
                self.persist(&mut record, previous).await?;
                tracing::info!(%key, calendar_event_id, "Applied pushed update");
                Ok(true)
            }
            Err(error) => {
                record.status = SyncStatus::NeedsUpdate;
                self.persist(&mut record, previous).await?;
                tracing::warn!(%key, calendar_event_id, %error, "Pushed update deferred to reconciliation");
                Err(error)
            }
        }
    }

    async fn repair_locked(&self, key: SyncKey, entity: &ServerEntity) -> Result<RepairOutcome> {
        let Some(mut record) = self.store.get(key).await? else {
            return Ok(RepairOutcome::Skipped);
        };
        let Some(calendar_event_id) = record.calendar_event_id.clone() else {
            return Ok(RepairOutcome::Skipped);
        };

        let needs_repair = match record.status {
            SyncStatus::NeedsUpdate => true,
            SyncStatus::Synced => record.is_stale(entity.updated_at),
            SyncStatus::NotSynced | SyncStatus::Deleted | SyncStatus::Error => {
                return Ok(RepairOutcome::Skipped);
            }
        };
        if !needs_repair {
            return Ok(RepairOutcome::UpToDate);
        }
        if !self.permission_granted().await {
            return Err(Error::PermissionDenied);
        }

        let previous = Some(record.status);
        let patch = EventPatch::from(&entity.draft);
        match self
            .provider_call(self.provider.update_event(&calendar_event_id, &patch))
            .await
        {
            Ok(true) => {
                record.status = SyncStatus::Synced;
                record.synced_at = Some(unix_millis_now());
                record.last_server_updated_at = Some(entity.updated_at);
                self.persist(&mut record, previous).await?;
                tracing::info!(%key, %calendar_event_id, "Reconciled stale device entry");
                Ok(RepairOutcome::Updated)
            }
            Ok(false) => {
                record.status = SyncStatus::NotSynced;
                record.calendar_event_id = None;
                record.synced_at = None;
                self.persist(&mut record, previous).await?;
                tracing::info!(%key, %calendar_event_id, "Device entry removed outside the app");
                Ok(RepairOutcome::EntryMissing)
            }
            Err(error) if error.is_provider_failure() => {
                record.status = SyncStatus::NeedsUpdate;
                self.persist(&mut record, previous).await?;
                Err(error)
            }
            Err(error) => Err(error),
        }
    }
}
