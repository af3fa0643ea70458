//! User calendar preference model

use serde::{Deserialize, Serialize};

/// Process-wide calendar sync preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCalendarPreference {
    /// Calendar new entries are written to
    pub preferred_calendar_id: Option<String>,
    /// Whether RSVP changes sync automatically
    pub auto_sync_enabled: bool,
}

impl Default for UserCalendarPreference {
    fn default() -> Self {
        Self {
            preferred_calendar_id: None,
            auto_sync_enabled: true,
        }
    }
}

impl UserCalendarPreference {
    pub const fn has_preferred_calendar(&self) -> bool {
        self.preferred_calendar_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_default() {
        let preference = UserCalendarPreference::default();
        assert!(preference.auto_sync_enabled);
        assert!(!preference.has_preferred_calendar());
    }
}
