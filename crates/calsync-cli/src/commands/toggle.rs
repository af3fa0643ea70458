use calsync_core::models::RsvpStatus;
use calsync_core::policy::AutoSyncAction;
use calsync_core::ToggleOutcome;

use crate::commands::common::{not_in_agenda, Engine};
use crate::error::CliError;

pub async fn run_toggle(engine: &Engine, id: i64) -> Result<ToggleOutcome, CliError> {
    let snapshot = engine.agenda.load().await?;
    let entry = snapshot
        .agenda_item(id)
        .ok_or_else(|| not_in_agenda("agenda item", id, engine.agenda.path()))?;

    let outcome = engine
        .manager
        .toggle_agenda_item(&entry.item, &entry.event_name)
        .await?;

    match &outcome {
        ToggleOutcome::Synced(record) => println!(
            "Added to calendar ({})",
            record.calendar_event_id.as_deref().unwrap_or("-")
        ),
        ToggleOutcome::Removed => println!("Removed from calendar"),
        ToggleOutcome::CalendarSelectionRequired(calendars) => {
            println!("Pick a calendar first with `calsync prefs set --calendar <ID>`:");
            for calendar in calendars {
                println!("  {:<24}  {}", calendar.id, calendar.name);
            }
        }
    }
    Ok(outcome)
}

pub async fn run_rsvp(
    engine: &Engine,
    id: i64,
    from: RsvpStatus,
    to: RsvpStatus,
) -> Result<AutoSyncAction, CliError> {
    let snapshot = engine.agenda.load().await?;
    let entry = snapshot
        .agenda_item(id)
        .ok_or_else(|| not_in_agenda("agenda item", id, engine.agenda.path()))?;

    let action = engine
        .manager
        .handle_rsvp_change(&entry.item, &entry.event_name, Some(from), to)
        .await?;

    match action {
        AutoSyncAction::Sync => println!("RSVP {to}: added to calendar"),
        AutoSyncAction::Unsync => println!("RSVP {to}: removed from calendar"),
        AutoSyncAction::None => println!("RSVP {to}: calendar unchanged"),
    }
    Ok(action)
}
