//! In-memory calendar store that records every call.
//!
//! Used by tests and by hosts that have no native calendar store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::CalendarProvider;
use crate::models::{CalendarInfo, EventDraft, EventPatch};
use crate::{Error, Result};

/// A provider call as observed by the double
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    ListCalendars,
    Create { calendar_id: String, title: String },
    Update { calendar_event_id: String },
    Delete { calendar_event_id: String },
}

#[derive(Debug, Default)]
struct State {
    calendars: Vec<CalendarInfo>,
    entries: HashMap<String, (String, EventDraft)>,
    calls: Vec<ProviderCall>,
    permission: bool,
    grant_on_request: bool,
    fail_creates: bool,
    fail_updates: bool,
    fail_deletes: bool,
    latency: Option<Duration>,
    next_id: u64,
}

/// Recording in-memory `CalendarProvider`
#[derive(Debug)]
pub struct InMemoryCalendarProvider {
    state: Mutex<State>,
}

impl Default for InMemoryCalendarProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCalendarProvider {
    /// Provider with permission granted and one calendar `cal-1`.
    pub fn new() -> Self {
        Self::with_calendars(vec![CalendarInfo {
            id: "cal-1".to_string(),
            name: "Personal".to_string(),
            account_name: "local".to_string(),
        }])
    }

    pub fn with_calendars(calendars: Vec<CalendarInfo>) -> Self {
        Self {
            state: Mutex::new(State {
                calendars,
                permission: true,
                grant_on_request: true,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the recorded calls from the others
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn set_permission(&self, granted: bool) {
        self.state().permission = granted;
    }

    /// Whether `request_permission` grants access.
    pub fn set_grant_on_request(&self, grant: bool) {
        self.state().grant_on_request = grant;
    }

    pub fn set_fail_creates(&self, fail: bool) {
        self.state().fail_creates = fail;
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.state().fail_updates = fail;
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.state().fail_deletes = fail;
    }

    /// Delay applied before every create/update/delete/list.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Seed an entry as if it had been created earlier.
    pub fn insert_entry(&self, calendar_event_id: &str, calendar_id: &str, draft: EventDraft) {
        self.state().entries.insert(
            calendar_event_id.to_string(),
            (calendar_id.to_string(), draft),
        );
    }

    /// Drop an entry behind the engine's back, as a user editing the device calendar would.
    pub fn remove_entry(&self, calendar_event_id: &str) -> bool {
        self.state().entries.remove(calendar_event_id).is_some()
    }

    pub fn entry(&self, calendar_event_id: &str) -> Option<EventDraft> {
        self.state()
            .entries
            .get(calendar_event_id)
            .map(|(_, draft)| draft.clone())
    }

    /// Calendar holding `calendar_event_id`, if the entry exists.
    pub fn entry_calendar(&self, calendar_event_id: &str) -> Option<String> {
        self.state()
            .entries
            .get(calendar_event_id)
            .map(|(calendar_id, _)| calendar_id.clone())
    }

    pub fn entry_count(&self) -> usize {
        self.state().entries.len()
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::Create { .. }))
    }

    pub fn update_calls(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::Update { .. }))
    }

    pub fn delete_calls(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::Delete { .. }))
    }

    fn count(&self, predicate: impl Fn(&ProviderCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    async fn simulate_latency(&self) {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl CalendarProvider for InMemoryCalendarProvider {
    async fn has_permission(&self) -> bool {
        self.state().permission
    }

    async fn request_permission(&self) -> bool {
        let mut state = self.state();
        if state.grant_on_request {
            state.permission = true;
        }
        state.permission
    }

    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.push(ProviderCall::ListCalendars);
        Ok(state.calendars.clone())
    }

    async fn create_event(&self, calendar_id: &str, draft: &EventDraft) -> Result<String> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.push(ProviderCall::Create {
            calendar_id: calendar_id.to_string(),
            title: draft.title.clone(),
        });

        if state.fail_creates {
            return Err(Error::Provider("create rejected by device store".to_string()));
        }
        if !state.calendars.iter().any(|calendar| calendar.id == calendar_id) {
            return Err(Error::Provider(format!("unknown calendar '{calendar_id}'")));
        }

        state.next_id += 1;
        let calendar_event_id = format!("mem-evt-{}", state.next_id);
        state.entries.insert(
            calendar_event_id.clone(),
            (calendar_id.to_string(), draft.clone()),
        );
        Ok(calendar_event_id)
    }

    async fn update_event(&self, calendar_event_id: &str, patch: &EventPatch) -> Result<bool> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.push(ProviderCall::Update {
            calendar_event_id: calendar_event_id.to_string(),
        });

        if state.fail_updates {
            return Err(Error::Provider("update rejected by device store".to_string()));
        }

        Ok(match state.entries.get_mut(calendar_event_id) {
            Some((_, draft)) => {
                patch.apply_to(draft);
                true
            }
            None => false,
        })
    }

    async fn delete_event(&self, calendar_event_id: &str) -> Result<bool> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.push(ProviderCall::Delete {
            calendar_event_id: calendar_event_id.to_string(),
        });

        if state.fail_deletes {
            return Err(Error::Provider("delete rejected by device store".to_string()));
        }

        Ok(state.entries.remove(calendar_event_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn draft(title: &str) -> EventDraft {
        EventDraft {
            title: title.to_string(),
            start: Utc.with_ymd_and_hms(2026, 7, 1, 18, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 7, 1, 19, 0, 0).unwrap(),
            timezone: None,
            location: None,
        }
    }

    #[tokio::test]
    async fn create_update_delete_lifecycle() {
        let provider = InMemoryCalendarProvider::new();

        let id = provider.create_event("cal-1", &draft("Gig")).await.unwrap();
        assert_eq!(provider.entry_count(), 1);

        let patch = EventPatch {
            title: Some("Gig (late)".to_string()),
            ..EventPatch::default()
        };
        assert!(provider.update_event(&id, &patch).await.unwrap());
        assert_eq!(provider.entry(&id).unwrap().title, "Gig (late)");

        assert!(provider.delete_event(&id).await.unwrap());
        assert!(!provider.delete_event(&id).await.unwrap());
        assert!(!provider.update_event(&id, &patch).await.unwrap());

        assert_eq!(provider.create_calls(), 1);
        assert_eq!(provider.update_calls(), 2);
        assert_eq!(provider.delete_calls(), 2);
    }

    #[tokio::test]
    async fn create_into_unknown_calendar_fails() {
        let provider = InMemoryCalendarProvider::new();
        let error = provider
            .create_event("missing", &draft("Gig"))
            .await
            .unwrap_err();
        assert!(error.is_provider_failure());
    }

    #[tokio::test]
    async fn permission_request_respects_configuration() {
        let provider = InMemoryCalendarProvider::new();
        provider.set_permission(false);
        provider.set_grant_on_request(false);
        assert!(!provider.request_permission().await);

        provider.set_grant_on_request(true);
        assert!(provider.request_permission().await);
        assert!(provider.has_permission().await);
    }
}
