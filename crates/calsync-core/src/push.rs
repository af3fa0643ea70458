//! Decoding of calendar-sync push payloads into sync commands.
//!
//! Push data arrives as a flat string map (the shape push transports deliver
//! to the client). Decoding has no side effects; the manager dispatches the
//! resulting [`SyncCommand`] only after a payload decoded cleanly.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::EventPatch;
use crate::util::normalize_text_option;

pub const CALENDAR_SYNC_DELETE: &str = "CALENDAR_SYNC_DELETE";
pub const CALENDAR_SYNC_UPDATE: &str = "CALENDAR_SYNC_UPDATE";
pub const CALENDAR_SYNC_BULK_DELETE: &str = "CALENDAR_SYNC_BULK_DELETE";
pub const CALENDAR_SYNC_EVENT_DELETE: &str = "CALENDAR_SYNC_EVENT_DELETE";
pub const CALENDAR_SYNC_EVENT_UPDATE: &str = "CALENDAR_SYNC_EVENT_UPDATE";

const TYPE_FIELD: &str = "type";
const QUEUE_ID_FIELD: &str = "queueId";

/// Why a push payload was rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("push payload has no message type")]
    MissingType,
    #[error("unknown push message type '{0}'")]
    UnknownType(String),
    #[error("push payload is missing field '{0}'")]
    MissingField(&'static str),
    #[error("push field '{field}' has invalid value '{value}'")]
    InvalidField { field: &'static str, value: String },
}

/// A typed calendar-sync push message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushMessage {
    AgendaItemDelete {
        agenda_item_id: i64,
        calendar_event_id: String,
        title: String,
    },
    AgendaItemUpdate {
        agenda_item_id: i64,
        calendar_event_id: String,
        title: String,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        timezone: Option<String>,
        location_id: Option<i64>,
        location_name: Option<String>,
    },
    BulkDelete {
        event_id: i64,
        event_title: String,
        agenda_item_ids: Vec<i64>,
        calendar_event_ids: Vec<String>,
    },
    EventDelete {
        event_id: i64,
        calendar_event_id: String,
    },
    EventUpdate {
        event_id: i64,
        calendar_event_id: String,
        title: String,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        timezone: Option<String>,
        venue_name: Option<String>,
    },
}

/// A decoded payload plus its delivery metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPush {
    pub message: PushMessage,
    /// Server-side delivery queue entry, when the sender attached one
    pub queue_id: Option<String>,
}

/// One-shot instruction for the sync manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SyncCommand {
    Delete {
        calendar_event_id: String,
    },
    Update {
        calendar_event_id: String,
        title: String,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        timezone: Option<String>,
        location: Option<String>,
    },
    BulkDelete {
        calendar_event_ids: Vec<String>,
    },
}

impl SyncCommand {
    /// Fields an `Update` writes onto the device entry.
    pub fn patch(&self) -> Option<EventPatch> {
        match self {
            Self::Update {
                title,
                start,
                end,
                timezone,
                location,
                ..
            } => Some(EventPatch {
                title: Some(title.clone()),
                start: *start,
                end: *end,
                timezone: timezone.clone(),
                location: location.clone(),
            }),
            Self::Delete { .. } | Self::BulkDelete { .. } => None,
        }
    }
}

impl PushMessage {
    pub const fn message_type(&self) -> &'static str {
        match self {
            Self::AgendaItemDelete { .. } => CALENDAR_SYNC_DELETE,
            Self::AgendaItemUpdate { .. } => CALENDAR_SYNC_UPDATE,
            Self::BulkDelete { .. } => CALENDAR_SYNC_BULK_DELETE,
            Self::EventDelete { .. } => CALENDAR_SYNC_EVENT_DELETE,
            Self::EventUpdate { .. } => CALENDAR_SYNC_EVENT_UPDATE,
        }
    }

    /// Every message type maps to exactly one command variant.
    pub fn into_command(self) -> SyncCommand {
        match self {
            Self::AgendaItemDelete {
                calendar_event_id, ..
            }
            | Self::EventDelete {
                calendar_event_id, ..
            } => SyncCommand::Delete { calendar_event_id },
            Self::AgendaItemUpdate {
                calendar_event_id,
                title,
                start_time,
                end_time,
                timezone,
                location_name,
                ..
            } => SyncCommand::Update {
                calendar_event_id,
                title,
                start: start_time,
                end: end_time,
                timezone,
                location: location_name,
            },
            Self::EventUpdate {
                calendar_event_id,
                title,
                start_time,
                end_time,
                timezone,
                venue_name,
                ..
            } => SyncCommand::Update {
                calendar_event_id,
                title,
                start: start_time,
                end: end_time,
                timezone,
                location: venue_name,
            },
            Self::BulkDelete {
                calendar_event_ids, ..
            } => SyncCommand::BulkDelete { calendar_event_ids },
        }
    }
}

/// Whether a push payload belongs to the calendar-sync family at all.
pub fn is_calendar_sync(data: &HashMap<String, String>) -> bool {
    data.get(TYPE_FIELD)
        .is_some_and(|kind| kind.trim().starts_with("CALENDAR_SYNC_"))
}

/// Decode a push payload delivered as a string map.
pub fn decode(data: &HashMap<String, String>) -> Result<DecodedPush, DecodeError> {
    let fields = Fields(data);
    let kind = fields.optional_str(TYPE_FIELD).ok_or(DecodeError::MissingType)?;

    let message = match kind.as_str() {
        CALENDAR_SYNC_DELETE => PushMessage::AgendaItemDelete {
            agenda_item_id: fields.required_int("agendaItemId")?,
            calendar_event_id: fields.required_str("calendarEventId")?,
            title: fields.optional_str("title").unwrap_or_default(),
        },
        CALENDAR_SYNC_UPDATE => PushMessage::AgendaItemUpdate {
            agenda_item_id: fields.required_int("agendaItemId")?,
            calendar_event_id: fields.required_str("calendarEventId")?,
            title: fields.required_str("title")?,
            start_time: fields.optional_time("startTime")?,
            end_time: fields.optional_time("endTime")?,
            timezone: fields.optional_str("timezone"),
            location_id: fields.optional_int("locationId")?,
            location_name: fields.optional_str("locationName"),
        },
        CALENDAR_SYNC_BULK_DELETE => PushMessage::BulkDelete {
            event_id: fields.required_int("eventId")?,
            event_title: fields.optional_str("eventTitle").unwrap_or_default(),
            agenda_item_ids: fields.int_list("agendaItemIds")?,
            calendar_event_ids: fields.str_list("calendarEventIds")?,
        },
        CALENDAR_SYNC_EVENT_DELETE => PushMessage::EventDelete {
            event_id: fields.required_int("eventId")?,
            calendar_event_id: fields.required_str("calendarEventId")?,
        },
        CALENDAR_SYNC_EVENT_UPDATE => PushMessage::EventUpdate {
            event_id: fields.required_int("eventId")?,
            calendar_event_id: fields.required_str("calendarEventId")?,
            title: fields.required_str("title")?,
            start_time: fields.optional_time("startTime")?,
            end_time: fields.optional_time("endTime")?,
            timezone: fields.optional_str("timezone"),
            venue_name: fields.optional_str("venueName"),
        },
        other => return Err(DecodeError::UnknownType(other.to_string())),
    };

    Ok(DecodedPush {
        message,
        queue_id: fields.optional_str(QUEUE_ID_FIELD),
    })
}

/// Flatten a JSON object into the string map push transports deliver.
///
/// Nulls are dropped; arrays and numbers keep their JSON text.
pub fn payload_from_json(value: &serde_json::Value) -> Option<HashMap<String, String>> {
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), text))
            })
            .collect(),
    )
}

struct Fields<'a>(&'a HashMap<String, String>);

impl Fields<'_> {
    fn optional_str(&self, field: &str) -> Option<String> {
        normalize_text_option(self.0.get(field).cloned())
    }

    fn required_str(&self, field: &'static str) -> Result<String, DecodeError> {
        self.optional_str(field)
            .ok_or(DecodeError::MissingField(field))
    }

    fn optional_int(&self, field: &'static str) -> Result<Option<i64>, DecodeError> {
        self.optional_str(field)
            .map(|value| parse_int(field, &value))
            .transpose()
    }

    fn required_int(&self, field: &'static str) -> Result<i64, DecodeError> {
        self.optional_int(field)?
            .ok_or(DecodeError::MissingField(field))
    }

    fn optional_time(&self, field: &'static str) -> Result<Option<DateTime<Utc>>, DecodeError> {
        self.optional_str(field)
            .map(|value| {
                parse_time(&value).ok_or(DecodeError::InvalidField { field, value })
            })
            .transpose()
    }

    fn str_list(&self, field: &'static str) -> Result<Vec<String>, DecodeError> {
        let Some(raw) = self.optional_str(field) else {
            return Ok(Vec::new());
        };

        if raw.starts_with('[') {
            let values: Vec<serde_json::Value> =
                serde_json::from_str(&raw).map_err(|_| DecodeError::InvalidField {
                    field,
                    value: raw.clone(),
                })?;
            return Ok(values
                .into_iter()
                .filter_map(|value| match value {
                    serde_json::Value::String(text) => normalize_text_option(Some(text)),
                    serde_json::Value::Number(number) => Some(number.to_string()),
                    _ => None,
                })
                .collect());
        }

        Ok(raw
            .split(',')
            .filter_map(|part| normalize_text_option(Some(part.to_string())))
            .collect())
    }

    fn int_list(&self, field: &'static str) -> Result<Vec<i64>, DecodeError> {
        self.str_list(field)?
            .iter()
            .map(|value| parse_int(field, value))
            .collect()
    }
}

fn parse_int(field: &'static str, value: &str) -> Result<i64, DecodeError> {
    value.parse().map_err(|_| DecodeError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// RFC 3339, a zone-less ISO timestamp (read as UTC), or Unix milliseconds.
fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn payload(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn decodes_agenda_item_delete() {
        let decoded = decode(&payload(&[
            ("type", "CALENDAR_SYNC_DELETE"),
            ("agendaItemId", "42"),
            ("calendarEventId", "evt-9"),
            ("title", "Opening talk"),
        ]))
        .unwrap();

        assert_eq!(
            decoded.message,
            PushMessage::AgendaItemDelete {
                agenda_item_id: 42,
                calendar_event_id: "evt-9".to_string(),
                title: "Opening talk".to_string(),
            }
        );
        assert_eq!(decoded.queue_id, None);
        assert_eq!(
            decoded.message.into_command(),
            SyncCommand::Delete {
                calendar_event_id: "evt-9".to_string()
            }
        );
    }

    #[test]
    fn decodes_agenda_item_update_with_optional_fields() {
        let decoded = decode(&payload(&[
            ("type", "CALENDAR_SYNC_UPDATE"),
            ("agendaItemId", "42"),
            ("calendarEventId", "evt-9"),
            ("title", "Opening talk (moved)"),
            ("startTime", "2026-06-03T10:00:00Z"),
            ("endTime", "2026-06-03T10:45:00"),
            ("timezone", "America/New_York"),
            ("locationId", "7"),
            ("locationName", "Room 2"),
            ("queueId", "q-123"),
        ]))
        .unwrap();

        assert_eq!(decoded.queue_id.as_deref(), Some("q-123"));
        let command = decoded.message.into_command();
        assert_eq!(
            command,
            SyncCommand::Update {
                calendar_event_id: "evt-9".to_string(),
                title: "Opening talk (moved)".to_string(),
                start: Some(Utc.with_ymd_and_hms(2026, 6, 3, 10, 0, 0).unwrap()),
                end: Some(Utc.with_ymd_and_hms(2026, 6, 3, 10, 45, 0).unwrap()),
                timezone: Some("America/New_York".to_string()),
                location: Some("Room 2".to_string()),
            }
        );
        assert_eq!(
            command.patch().unwrap().location.as_deref(),
            Some("Room 2")
        );
    }

    #[test]
    fn update_without_times_leaves_them_unset() {
        let decoded = decode(&payload(&[
            ("type", "CALENDAR_SYNC_EVENT_UPDATE"),
            ("eventId", "5"),
            ("calendarEventId", "evt-1"),
            ("title", "Festival"),
            ("startTime", ""),
            ("venueName", "Park"),
        ]))
        .unwrap();

        let patch = decoded.message.into_command().patch().unwrap();
        assert_eq!(patch.start, None);
        assert_eq!(patch.end, None);
        assert_eq!(patch.location.as_deref(), Some("Park"));
    }

    #[test]
    fn decodes_bulk_delete_lists_in_both_encodings() {
        let json_lists = decode(&payload(&[
            ("type", "CALENDAR_SYNC_BULK_DELETE"),
            ("eventId", "5"),
            ("eventTitle", "Festival"),
            ("agendaItemIds", "[1, 2, 3]"),
            ("calendarEventIds", r#"["a","b","c"]"#),
        ]))
        .unwrap();
        let comma_lists = decode(&payload(&[
            ("type", "CALENDAR_SYNC_BULK_DELETE"),
            ("eventId", "5"),
            ("eventTitle", "Festival"),
            ("agendaItemIds", "1,2,3"),
            ("calendarEventIds", "a, b ,c"),
        ]))
        .unwrap();

        assert_eq!(json_lists, comma_lists);
        assert_eq!(
            json_lists.message.into_command(),
            SyncCommand::BulkDelete {
                calendar_event_ids: vec!["a".to_string(), "b".to_string(), "c".to_string()]
            }
        );
    }

    #[test]
    fn decodes_event_delete() {
        let decoded = decode(&payload(&[
            ("type", "CALENDAR_SYNC_EVENT_DELETE"),
            ("eventId", "5"),
            ("calendarEventId", "evt-event"),
        ]))
        .unwrap();
        assert_eq!(decoded.message.message_type(), CALENDAR_SYNC_EVENT_DELETE);
        assert_eq!(
            decoded.message.into_command(),
            SyncCommand::Delete {
                calendar_event_id: "evt-event".to_string()
            }
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_payloads() {
        assert_eq!(decode(&payload(&[])), Err(DecodeError::MissingType));
        assert_eq!(
            decode(&payload(&[("type", "FRIEND_REQUEST")])),
            Err(DecodeError::UnknownType("FRIEND_REQUEST".to_string()))
        );
        assert_eq!(
            decode(&payload(&[
                ("type", "CALENDAR_SYNC_DELETE"),
                ("agendaItemId", "42"),
            ])),
            Err(DecodeError::MissingField("calendarEventId"))
        );
        assert_eq!(
            decode(&payload(&[
                ("type", "CALENDAR_SYNC_DELETE"),
                ("agendaItemId", "forty-two"),
                ("calendarEventId", "evt-9"),
            ])),
            Err(DecodeError::InvalidField {
                field: "agendaItemId",
                value: "forty-two".to_string()
            })
        );
        assert!(matches!(
            decode(&payload(&[
                ("type", "CALENDAR_SYNC_UPDATE"),
                ("agendaItemId", "42"),
                ("calendarEventId", "evt-9"),
                ("title", "Talk"),
                ("startTime", "next tuesday"),
            ])),
            Err(DecodeError::InvalidField {
                field: "startTime",
                ..
            })
        ));
    }

    #[test]
    fn json_payload_accepts_native_values() {
        let data = payload_from_json(&serde_json::json!({
            "type": "CALENDAR_SYNC_BULK_DELETE",
            "eventId": 5,
            "eventTitle": "Festival",
            "agendaItemIds": [1, 2],
            "calendarEventIds": ["a", "c"],
            "queueId": null
        }))
        .unwrap();
        assert!(!data.contains_key("queueId"));
        let decoded = decode(&data).unwrap();

        assert_eq!(
            decoded.message,
            PushMessage::BulkDelete {
                event_id: 5,
                event_title: "Festival".to_string(),
                agenda_item_ids: vec![1, 2],
                calendar_event_ids: vec!["a".to_string(), "c".to_string()],
            }
        );
    }

    #[test]
    fn recognises_calendar_sync_family() {
        assert!(is_calendar_sync(&payload(&[("type", "CALENDAR_SYNC_UPDATE")])));
        assert!(!is_calendar_sync(&payload(&[("type", "NEW_FOLLOWER")])));
        assert!(!is_calendar_sync(&payload(&[])));
    }

    #[test]
    fn parses_epoch_millis() {
        assert_eq!(
            parse_time("1780000000000"),
            DateTime::from_timestamp_millis(1_780_000_000_000)
        );
    }
}
