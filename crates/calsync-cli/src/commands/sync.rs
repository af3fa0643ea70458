use calsync_core::models::SyncRecord;

use crate::commands::common::{normalize_calendar_id, not_in_agenda, Engine};
use crate::error::CliError;

pub async fn run_sync(
    engine: &Engine,
    id: i64,
    as_event: bool,
    calendar: Option<&str>,
) -> Result<SyncRecord, CliError> {
    let calendar_id = match normalize_calendar_id(calendar) {
        Some(calendar_id) => calendar_id,
        None => engine
            .manager
            .get_preferred_calendar_id()
            .await?
            .ok_or(CliError::NoCalendar)?,
    };

    let snapshot = engine.agenda.load().await?;
    let record = if as_event {
        let event = snapshot
            .event(id)
            .ok_or_else(|| not_in_agenda("event", id, engine.agenda.path()))?;
        engine
            .manager
            .sync_event_to_calendar(event, &calendar_id)
            .await?
    } else {
        let entry = snapshot
            .agenda_item(id)
            .ok_or_else(|| not_in_agenda("agenda item", id, engine.agenda.path()))?;
        engine
            .manager
            .sync_agenda_item_to_calendar(&entry.item, &entry.event_name, &calendar_id)
            .await?
    };

    println!(
        "Synced {} {} to {calendar_id} ({})",
        record.key.entity_type,
        record.key.entity_id,
        record.calendar_event_id.as_deref().unwrap_or("-")
    );
    Ok(record)
}

pub async fn run_remove(engine: &Engine, id: i64, as_event: bool) -> Result<(), CliError> {
    if as_event {
        engine.manager.remove_event_from_calendar(id).await?;
        println!("Removed event {id} from the calendar");
    } else {
        engine.manager.remove_agenda_item_from_calendar(id).await?;
        println!("Removed agenda item {id} from the calendar");
    }
    Ok(())
}
