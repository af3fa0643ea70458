use std::path::Path;

use calsync_core::models::{AgendaItem, EventDraft, EventPatch, RsvpStatus, SyncStatus};
use calsync_core::policy::AutoSyncAction;
use calsync_core::{CalendarProvider, PushOutcome, ToggleOutcome};
use chrono::{TimeZone, Utc};
use clap::Parser;
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

use crate::agenda_file::{AgendaEntry, AgendaSnapshot};
use crate::cli::{Cli, Commands};
use crate::calendar_store::{CalendarFile, FileCalendarProvider};
use crate::commands::common::{
    format_record_lines, format_timestamp, open_engine, resolve_paths, Engine, Paths,
};
use crate::commands::push::{describe_push_outcome, parse_push_fields, read_payload_file, run_push};
use crate::commands::reconcile::run_reconcile;
use crate::commands::sync::{run_remove, run_sync};
use crate::commands::toggle::{run_rsvp, run_toggle};
use crate::error::CliError;

fn agenda_item(id: i64, title: &str, updated_hour: u32) -> AgendaItem {
    AgendaItem {
        id,
        title: title.to_string(),
        start: Utc.with_ymd_and_hms(2026, 6, 3, 10, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2026, 6, 3, 11, 0, 0).unwrap(),
        timezone: Some("Europe/Berlin".to_string()),
        location_name: Some("Main stage".to_string()),
        updated_at: Utc.with_ymd_and_hms(2026, 6, 1, updated_hour, 0, 0).unwrap(),
    }
}

fn write_agenda(path: &Path, items: &[AgendaItem]) {
    let snapshot = AgendaSnapshot {
        events: Vec::new(),
        agenda_items: items
            .iter()
            .cloned()
            .map(|item| AgendaEntry {
                event_name: "Festival".to_string(),
                item,
            })
            .collect(),
    };
    std::fs::write(path, serde_json::to_string_pretty(&snapshot).unwrap()).unwrap();
}

fn paths(dir: &TempDir) -> Paths {
    Paths {
        config: dir.path().join("config.json"),
        db_path: Some(dir.path().join("calsync.db")),
        calendar_store: dir.path().join("calendar.json"),
        agenda: dir.path().join("agenda.json"),
    }
}

async fn engine_in(dir: &TempDir) -> Engine {
    open_engine(&paths(dir)).await.unwrap()
}

fn calendar_file(dir: &TempDir) -> CalendarFile {
    let raw = std::fs::read_to_string(dir.path().join("calendar.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn parse_push_fields_splits_key_value_pairs() {
    let data = parse_push_fields(&[
        "type=CALENDAR_SYNC_DELETE".to_string(),
        "calendarEventId = evt-9".to_string(),
        "title=a=b".to_string(),
    ])
    .unwrap();

    assert_eq!(data["type"], "CALENDAR_SYNC_DELETE");
    assert_eq!(data["calendarEventId"], "evt-9");
    assert_eq!(data["title"], "a=b");
}

#[test]
fn parse_push_fields_rejects_malformed_pairs() {
    assert!(matches!(
        parse_push_fields(&["no-separator".to_string()]),
        Err(CliError::InvalidPushField(_))
    ));
    assert!(matches!(
        parse_push_fields(&["=value".to_string()]),
        Err(CliError::InvalidPushField(_))
    ));
}

#[test]
fn read_payload_file_flattens_json_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("push.json");
    std::fs::write(
        &path,
        r#"{ "type": "CALENDAR_SYNC_BULK_DELETE", "eventId": 5, "calendarEventIds": ["a", "b"] }"#,
    )
    .unwrap();

    let data = read_payload_file(&path).unwrap();
    assert_eq!(data["eventId"], "5");
    assert_eq!(data["calendarEventIds"], r#"["a","b"]"#);

    std::fs::write(&path, "[1, 2]").unwrap();
    assert!(matches!(read_payload_file(&path), Err(CliError::Config(_))));
}

#[test]
fn describe_push_outcome_pluralizes() {
    assert_eq!(
        describe_push_outcome(PushOutcome::Applied(1)),
        "Applied to 1 calendar entry"
    );
    assert_eq!(
        describe_push_outcome(PushOutcome::Applied(3)),
        "Applied to 3 calendar entries"
    );
}

#[test]
fn resolve_paths_prefers_explicit_arguments() {
    let dir = tempdir().unwrap();
    let expected = paths(&dir);

    let resolved = resolve_paths(
        Some(expected.config.clone()),
        expected.db_path.clone(),
        Some(expected.calendar_store.clone()),
        Some(expected.agenda.clone()),
    )
    .unwrap();

    assert_eq!(resolved, expected);
}

#[test]
fn format_timestamp_handles_missing_values() {
    assert_eq!(format_timestamp(None), "-");
    assert_eq!(
        format_timestamp(Some(
            Utc.with_ymd_and_hms(2026, 6, 3, 10, 5, 0)
                .unwrap()
                .timestamp_millis()
        )),
        "2026-06-03 10:05"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn file_provider_persists_entries() {
    let dir = tempdir().unwrap();
    let provider = FileCalendarProvider::new(dir.path().join("nested").join("calendar.json"));
    let draft = EventDraft {
        title: "Gig".to_string(),
        start: Utc.with_ymd_and_hms(2026, 7, 1, 18, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2026, 7, 1, 19, 0, 0).unwrap(),
        timezone: None,
        location: None,
    };

    assert!(provider.has_permission().await);
    let calendars = provider.list_calendars().await.unwrap();
    assert_eq!(calendars.len(), 1);

    let id = provider.create_event("local", &draft).await.unwrap();
    let patch = EventPatch {
        title: Some("Gig (late)".to_string()),
        ..EventPatch::default()
    };
    assert!(provider.update_event(&id, &patch).await.unwrap());

    let reopened = FileCalendarProvider::new(provider.path());
    let file = reopened.load().await.unwrap();
    assert_eq!(file.entries[&id].draft.title, "Gig (late)");
    assert_eq!(file.entries[&id].calendar_id, "local");

    assert!(reopened.delete_event(&id).await.unwrap());
    assert!(!reopened.delete_event(&id).await.unwrap());
    assert!(!reopened.update_event(&id, &patch).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn file_provider_rejects_unknown_calendar() {
    let dir = tempdir().unwrap();
    let provider = FileCalendarProvider::new(dir.path().join("calendar.json"));
    let draft = EventDraft {
        title: "Gig".to_string(),
        start: Utc.with_ymd_and_hms(2026, 7, 1, 18, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2026, 7, 1, 19, 0, 0).unwrap(),
        timezone: None,
        location: None,
    };

    let error = provider.create_event("work", &draft).await.unwrap_err();
    assert!(error.is_provider_failure());
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_then_reconcile_follows_agenda_changes() {
    let dir = tempdir().unwrap();
    let engine = engine_in(&dir).await;
    write_agenda(engine.agenda.path(), &[agenda_item(42, "Opening talk", 8)]);

    let record = run_sync(&engine, 42, false, Some("local")).await.unwrap();
    assert_eq!(record.status, SyncStatus::Synced);
    let calendar_event_id = record.calendar_event_id.unwrap();
    assert_eq!(
        calendar_file(&dir).entries[&calendar_event_id].draft.title,
        "Festival: Opening talk"
    );
    assert_eq!(
        engine.manager.get_preferred_calendar_id().await.unwrap().as_deref(),
        Some("local")
    );

    write_agenda(engine.agenda.path(), &[agenda_item(42, "Opening talk (moved)", 9)]);
    let report = run_reconcile(&engine, false).await.unwrap().unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(
        calendar_file(&dir).entries[&calendar_event_id].draft.title,
        "Festival: Opening talk (moved)"
    );

    run_remove(&engine, 42, false).await.unwrap();
    assert!(calendar_file(&dir).entries.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_without_calendar_needs_a_preference() {
    let dir = tempdir().unwrap();
    let engine = engine_in(&dir).await;
    write_agenda(engine.agenda.path(), &[agenda_item(42, "Talk", 8)]);

    assert!(matches!(
        run_sync(&engine, 42, false, None).await,
        Err(CliError::NoCalendar)
    ));
    assert!(matches!(
        run_sync(&engine, 7, false, Some("local")).await,
        Err(CliError::NotInAgenda(_, _))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn toggle_and_rsvp_drive_the_engine() {
    let dir = tempdir().unwrap();
    let engine = engine_in(&dir).await;
    write_agenda(
        engine.agenda.path(),
        &[agenda_item(42, "Talk", 8), agenda_item(43, "Panel", 8)],
    );

    let first = run_toggle(&engine, 42).await.unwrap();
    assert!(matches!(first, ToggleOutcome::CalendarSelectionRequired(_)));

    engine.manager.set_preferred_calendar("local").await.unwrap();
    assert!(matches!(
        run_toggle(&engine, 42).await.unwrap(),
        ToggleOutcome::Synced(_)
    ));
    assert_eq!(run_toggle(&engine, 42).await.unwrap(), ToggleOutcome::Removed);

    let action = run_rsvp(&engine, 43, RsvpStatus::Undecided, RsvpStatus::Going)
        .await
        .unwrap();
    assert_eq!(action, AutoSyncAction::Sync);
    assert!(engine.manager.is_agenda_item_synced(43).await.unwrap());
}

#[test]
fn rsvp_from_defaults_to_undecided() {
    let cli = Cli::try_parse_from(["calsync", "rsvp", "42", "--to", "going"]).unwrap();
    let Commands::Rsvp { id, from, to } = cli.command else {
        panic!("expected rsvp command");
    };
    assert_eq!(id, 42);
    assert_eq!(RsvpStatus::from(from), RsvpStatus::Undecided);
    assert_eq!(RsvpStatus::from(to), RsvpStatus::Going);
}

#[tokio::test(flavor = "multi_thread")]
async fn push_delete_removes_the_entry() {
    let dir = tempdir().unwrap();
    let engine = engine_in(&dir).await;
    write_agenda(engine.agenda.path(), &[agenda_item(42, "Talk", 8)]);
    let record = run_sync(&engine, 42, false, Some("local")).await.unwrap();
    let calendar_event_id = record.calendar_event_id.unwrap();

    let outcome = run_push(
        &engine,
        &[
            "type=CALENDAR_SYNC_DELETE".to_string(),
            "agendaItemId=42".to_string(),
            format!("calendarEventId={calendar_event_id}"),
        ],
        None,
    )
    .await
    .unwrap();

    assert_eq!(outcome, PushOutcome::Applied(1));
    assert!(calendar_file(&dir).entries.is_empty());
    assert!(matches!(
        run_push(&engine, &[], None).await,
        Err(CliError::EmptyPush)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn record_lines_show_status_and_entry() {
    let dir = tempdir().unwrap();
    let engine = engine_in(&dir).await;
    write_agenda(engine.agenda.path(), &[agenda_item(42, "Talk", 8)]);
    let record = run_sync(&engine, 42, false, Some("local")).await.unwrap();

    let lines = format_record_lines(&engine.manager.sync_records().await.unwrap());

    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("AGENDA_ITEM 42"));
    assert!(lines[0].contains("SYNCED"));
    assert!(lines[0].ends_with(record.calendar_event_id.as_deref().unwrap()));
}
