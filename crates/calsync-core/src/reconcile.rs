//! Foreground reconciliation.
//!
//! Safety net for push messages that were dropped, delayed or arrived while
//! the app was not running: every SYNCED or NEEDS_UPDATE record is compared
//! with the current server copy and re-applied through the sync manager when
//! the device entry is behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::manager::{CalendarSyncManager, RepairOutcome};
use crate::models::{EntityType, ServerEntity, SyncKey, SyncRecord, SyncStatus};
use crate::Result;

/// Read access to the server's current agenda data
#[async_trait]
pub trait ServerAgenda: Send + Sync {
    /// Current server copies of `keys`; entities the server no longer knows
    /// are left out of the result.
    async fn fetch_entities(&self, keys: &[SyncKey]) -> Result<Vec<ServerEntity>>;
}

/// Counters for one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Records with a device entry that were compared
    pub checked: usize,
    pub updated: usize,
    /// Device entries found deleted outside the app
    pub repaired_missing: usize,
    /// Records whose entity the server did not return
    pub missing_on_server: usize,
    pub failed: usize,
}

/// Runs reconciliation at most once per foreground transition.
#[derive(Clone)]
pub struct ReconciliationRunner {
    manager: CalendarSyncManager,
    agenda: Arc<dyn ServerAgenda>,
    enabled: bool,
    in_foreground: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

struct PassGuard(Arc<AtomicBool>);

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReconciliationRunner {
    pub fn new(
        manager: CalendarSyncManager,
        agenda: Arc<dyn ServerAgenda>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            manager,
            agenda,
            enabled: config.reconcile_on_foreground,
            in_foreground: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Host came to the foreground. Starts a pass in the background unless
    /// this transition was already handled.
    pub fn on_foreground(&self) -> Option<JoinHandle<Result<Option<ReconcileReport>>>> {
        if !self.enabled || self.in_foreground.swap(true, Ordering::AcqRel) {
            return None;
        }

        let runner = self.clone();
        Some(tokio::spawn(async move {
            let result = runner.run_once().await;
            if let Err(error) = &result {
                tracing::warn!(%error, "Reconciliation pass failed");
            }
            result
        }))
    }

    pub fn on_background(&self) {
        self.in_foreground.store(false, Ordering::Release);
    }

    /// Run one pass now. `None` when another pass is still running.
    pub async fn run_once(&self) -> Result<Option<ReconcileReport>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Reconciliation already running");
            return Ok(None);
        }
        let _guard = PassGuard(Arc::clone(&self.running));

        self.reconcile().await.map(Some)
    }

    async fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        if !self.manager.has_calendar_permission().await {
            tracing::info!("Skipping reconciliation without calendar permission");
            return Ok(report);
        }

        let records: Vec<SyncRecord> = self
            .manager
            .store()
            .list_by_status(
                self.manager.platform(),
                &[SyncStatus::Synced, SyncStatus::NeedsUpdate],
            )
            .await?
            .into_iter()
            .filter(SyncRecord::has_device_entry)
            .collect();
        if records.is_empty() {
            return Ok(report);
        }

        let keys: Vec<SyncKey> = records.iter().map(|record| record.key).collect();
        let server: HashMap<(EntityType, i64), ServerEntity> = self
            .agenda
            .fetch_entities(&keys)
            .await?
            .into_iter()
            .map(|entity| ((entity.entity_type, entity.entity_id), entity))
            .collect();

        for record in records {
            report.checked += 1;
            let Some(entity) = server.get(&(record.key.entity_type, record.key.entity_id)) else {
                tracing::debug!(key = %record.key, "Entity not returned by server, leaving record");
                report.missing_on_server += 1;
                continue;
            };
            if record.status == SyncStatus::Synced && !record.is_stale(entity.updated_at) {
                continue;
            }

            match self.manager.repair_from_server(entity.clone()).await {
                Ok(RepairOutcome::Updated) => report.updated += 1,
                Ok(RepairOutcome::EntryMissing) => report.repaired_missing += 1,
                Ok(RepairOutcome::UpToDate | RepairOutcome::Skipped) => {}
                Err(error) => {
                    tracing::warn!(key = %record.key, %error, "Reconciliation repair failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            checked = report.checked,
            updated = report.updated,
            repaired_missing = report.repaired_missing,
            failed = report.failed,
            "Reconciliation pass finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::AgendaItem;
    use crate::provider::{CalendarProvider, InMemoryCalendarProvider};
    use crate::services::SyncRecordStore;

    #[derive(Default)]
    struct StaticAgenda {
        entities: Mutex<Vec<ServerEntity>>,
        fetches: AtomicUsize,
        delay: Option<Duration>,
    }

    impl StaticAgenda {
        fn set(&self, entities: Vec<ServerEntity>) {
            *self.entities.lock().unwrap() = entities;
        }
    }

    #[async_trait]
    impl ServerAgenda for StaticAgenda {
        async fn fetch_entities(&self, keys: &[SyncKey]) -> Result<Vec<ServerEntity>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let entities = self.entities.lock().unwrap().clone();
            Ok(entities
                .into_iter()
                .filter(|entity| {
                    keys.iter().any(|key| {
                        key.entity_type == entity.entity_type && key.entity_id == entity.entity_id
                    })
                })
                .collect())
        }
    }

    fn item(id: i64, title: &str, updated_hour: u32) -> AgendaItem {
        AgendaItem {
            id,
            title: title.to_string(),
            start: Utc.with_ymd_and_hms(2026, 6, 3, 10, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 6, 3, 11, 0, 0).unwrap(),
            timezone: None,
            location_name: None,
            updated_at: Utc.with_ymd_and_hms(2026, 6, 1, updated_hour, 0, 0).unwrap(),
        }
    }

    struct Fixture {
        manager: CalendarSyncManager,
        provider: Arc<InMemoryCalendarProvider>,
        agenda: Arc<StaticAgenda>,
        runner: ReconciliationRunner,
    }

    fn fixture(agenda: StaticAgenda) -> Fixture {
        let config = EngineConfig::default();
        let provider = Arc::new(InMemoryCalendarProvider::new());
        let manager = CalendarSyncManager::new(
            Arc::clone(&provider) as Arc<dyn CalendarProvider>,
            SyncRecordStore::open_in_memory().unwrap(),
            &config,
        );
        let agenda = Arc::new(agenda);
        let runner = ReconciliationRunner::new(
            manager.clone(),
            Arc::clone(&agenda) as Arc<dyn ServerAgenda>,
            &config,
        );
        Fixture {
            manager,
            provider,
            agenda,
            runner,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_record_gets_exactly_one_update() {
        let fx = fixture(StaticAgenda::default());
        fx.manager
            .sync_agenda_item_to_calendar(&item(42, "Talk", 8), "Festival", "cal-1")
            .await
            .unwrap();
        fx.manager
            .sync_agenda_item_to_calendar(&item(43, "Panel", 8), "Festival", "cal-1")
            .await
            .unwrap();
        let updates_before = fx.provider.update_calls();

        fx.agenda.set(vec![
            ServerEntity::from_agenda_item(&item(42, "Talk (moved)", 9), "Festival"),
            ServerEntity::from_agenda_item(&item(43, "Panel", 8), "Festival"),
        ]);
        let report = fx.runner.run_once().await.unwrap().unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                checked: 2,
                updated: 1,
                ..ReconcileReport::default()
            }
        );
        assert_eq!(fx.provider.update_calls() - updates_before, 1);
        assert_eq!(
            fx.provider.entry("mem-evt-1").unwrap().title,
            "Festival: Talk (moved)"
        );

        let again = fx.runner.run_once().await.unwrap().unwrap();
        assert_eq!(again.updated, 0);
        assert_eq!(fx.provider.update_calls() - updates_before, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn entry_deleted_on_device_is_marked_not_synced() {
        let fx = fixture(StaticAgenda::default());
        fx.manager
            .sync_agenda_item_to_calendar(&item(42, "Talk", 8), "Festival", "cal-1")
            .await
            .unwrap();
        fx.provider.remove_entry("mem-evt-1");
        fx.agenda
            .set(vec![ServerEntity::from_agenda_item(&item(42, "Talk", 9), "Festival")]);

        let report = fx.runner.run_once().await.unwrap().unwrap();

        assert_eq!(report.repaired_missing, 1);
        let record = fx
            .manager
            .sync_record(EntityType::AgendaItem, 42)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SyncStatus::NotSynced);
        assert_eq!(fx.provider.create_calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn entities_missing_on_server_are_left_alone() {
        let fx = fixture(StaticAgenda::default());
        fx.manager
            .sync_agenda_item_to_calendar(&item(42, "Talk", 8), "Festival", "cal-1")
            .await
            .unwrap();

        let report = fx.runner.run_once().await.unwrap().unwrap();

        assert_eq!(report.missing_on_server, 1);
        assert_eq!(
            fx.manager
                .sync_record(EntityType::AgendaItem, 42)
                .await
                .unwrap()
                .unwrap()
                .status,
            SyncStatus::Synced
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn foreground_runs_once_per_transition() {
        let fx = fixture(StaticAgenda::default());
        fx.manager
            .sync_agenda_item_to_calendar(&item(42, "Talk", 8), "Festival", "cal-1")
            .await
            .unwrap();

        let first = fx.runner.on_foreground().unwrap();
        assert!(fx.runner.on_foreground().is_none());
        first.await.unwrap().unwrap();
        assert_eq!(fx.agenda.fetches.load(Ordering::SeqCst), 1);

        fx.runner.on_background();
        fx.runner.on_foreground().unwrap().await.unwrap().unwrap();
        assert_eq!(fx.agenda.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overlapping_passes_are_skipped() {
        let fx = fixture(StaticAgenda {
            delay: Some(Duration::from_millis(200)),
            ..StaticAgenda::default()
        });
        fx.manager
            .sync_agenda_item_to_calendar(&item(42, "Talk", 8), "Festival", "cal-1")
            .await
            .unwrap();

        let runner = fx.runner.clone();
        let first = tokio::spawn(async move { runner.run_once().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(fx.runner.run_once().await.unwrap(), None);
        assert!(first.await.unwrap().unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disabled_runner_ignores_foreground() {
        let config = EngineConfig {
            reconcile_on_foreground: false,
            ..EngineConfig::default()
        };
        let manager = CalendarSyncManager::new(
            Arc::new(InMemoryCalendarProvider::new()),
            SyncRecordStore::open_in_memory().unwrap(),
            &config,
        );
        let runner = ReconciliationRunner::new(manager, Arc::new(StaticAgenda::default()), &config);

        assert!(runner.on_foreground().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_permission_means_no_pass() {
        let fx = fixture(StaticAgenda::default());
        fx.manager
            .sync_agenda_item_to_calendar(&item(42, "Talk", 8), "Festival", "cal-1")
            .await
            .unwrap();
        fx.provider.set_permission(false);

        let report = fx.runner.run_once().await.unwrap().unwrap();

        assert_eq!(report, ReconcileReport::default());
        assert_eq!(fx.agenda.fetches.load(Ordering::SeqCst), 0);
    }
}
