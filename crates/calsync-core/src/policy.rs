//! Auto-sync decisions driven by RSVP changes.
//!
//! Decisions are edge-triggered: only a transition into or out of GOING
//! produces an action, so repeated emissions of the same status never
//! re-sync an item.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::RsvpStatus;

/// What the engine should do after an RSVP change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutoSyncAction {
    Sync,
    Unsync,
    None,
}

/// Live state the decision depends on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoSyncContext {
    pub auto_sync_enabled: bool,
    pub has_preferred_calendar: bool,
    pub has_permission: bool,
    /// Whether the item currently has a SYNCED record
    pub is_synced: bool,
}

/// Decide the action for a `previous -> new` RSVP transition.
///
/// `previous` is `None` for the first status observed for an item, which
/// establishes a baseline and never triggers an action.
pub fn decide(
    previous: Option<RsvpStatus>,
    new: RsvpStatus,
    context: AutoSyncContext,
) -> AutoSyncAction {
    let Some(previous) = previous else {
        return AutoSyncAction::None;
    };

    match (previous.is_going(), new.is_going()) {
        (false, true)
            if context.auto_sync_enabled
                && context.has_preferred_calendar
                && context.has_permission
                && !context.is_synced =>
        {
            AutoSyncAction::Sync
        }
        (true, false) if context.is_synced => AutoSyncAction::Unsync,
        _ => AutoSyncAction::None,
    }
}

/// A status change observed for one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsvpTransition {
    pub previous: Option<RsvpStatus>,
    pub current: RsvpStatus,
}

/// Remembers the last RSVP status per entity so that re-emissions of an
/// unchanged status are filtered out before reaching [`decide`].
#[derive(Debug, Default)]
pub struct RsvpEdgeTracker {
    last_seen: HashMap<i64, RsvpStatus>,
}

impl RsvpEdgeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `status` for `entity_id`; `None` when it repeats the last one.
    pub fn observe(&mut self, entity_id: i64, status: RsvpStatus) -> Option<RsvpTransition> {
        let previous = self.last_seen.insert(entity_id, status);
        if previous == Some(status) {
            return None;
        }
        Some(RsvpTransition {
            previous,
            current: status,
        })
    }
}
