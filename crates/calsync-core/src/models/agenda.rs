//! Server-side agenda data as seen by the sync engine

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::{EntityType, EventDraft};

/// A scheduled session within an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaItem {
    pub id: i64,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
    /// Server modification time
    pub updated_at: DateTime<Utc>,
}

/// An event as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: i64,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub venue_name: Option<String>,
    /// Server modification time
    pub updated_at: DateTime<Utc>,
}

/// The user's attendance intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsvpStatus {
    Going,
    NotGoing,
    Undecided,
}

impl RsvpStatus {
    pub const fn is_going(self) -> bool {
        matches!(self, Self::Going)
    }
}

impl fmt::Display for RsvpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Going => "GOING",
            Self::NotGoing => "NOT_GOING",
            Self::Undecided => "UNDECIDED",
        })
    }
}

impl FromStr for RsvpStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GOING" => Ok(Self::Going),
            "NOT_GOING" => Ok(Self::NotGoing),
            "UNDECIDED" => Ok(Self::Undecided),
            other => Err(Error::InvalidInput(format!("unknown RSVP status '{other}'"))),
        }
    }
}

/// Current server state of one entity, rendered as a calendar entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntity {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub draft: EventDraft,
    /// Server modification time (Unix ms)
    pub updated_at: i64,
}

impl ServerEntity {
    /// Render an agenda item; the owning event's name prefixes the title.
    pub fn from_agenda_item(item: &AgendaItem, event_name: &str) -> Self {
        let event_name = event_name.trim();
        let title = if event_name.is_empty() {
            item.title.clone()
        } else {
            format!("{event_name}: {}", item.title)
        };

        Self {
            entity_type: EntityType::AgendaItem,
            entity_id: item.id,
            draft: EventDraft {
                title,
                start: item.start,
                end: item.end,
                timezone: item.timezone.clone(),
                location: item.location_name.clone(),
            },
            updated_at: item.updated_at.timestamp_millis(),
        }
    }

    pub fn from_event(event: &EventSummary) -> Self {
        Self {
            entity_type: EntityType::Event,
            entity_id: event.id,
            draft: EventDraft {
                title: event.title.clone(),
                start: event.start,
                end: event.end,
                timezone: event.timezone.clone(),
                location: event.venue_name.clone(),
            },
            updated_at: event.updated_at.timestamp_millis(),
        }
    }
}
