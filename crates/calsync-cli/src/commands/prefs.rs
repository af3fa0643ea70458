use crate::commands::common::{normalize_calendar_id, Engine};
use crate::error::CliError;

pub async fn run_prefs_show(engine: &Engine, as_json: bool) -> Result<(), CliError> {
    let preferences = engine.manager.preferences().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&preferences)?);
    } else {
        println!(
            "preferred calendar: {}",
            preferences.preferred_calendar_id.as_deref().unwrap_or("(none)")
        );
        println!(
            "auto-sync:          {}",
            if preferences.auto_sync_enabled { "on" } else { "off" }
        );
    }
    Ok(())
}

pub async fn run_prefs_set(
    engine: &Engine,
    calendar: Option<&str>,
    auto_sync: Option<bool>,
) -> Result<(), CliError> {
    let calendar = normalize_calendar_id(calendar);
    if calendar.is_none() && auto_sync.is_none() {
        return Err(CliError::NothingToSet);
    }

    if let Some(calendar_id) = calendar {
        let known = engine
            .manager
            .get_available_calendars()
            .await?
            .iter()
            .any(|candidate| candidate.id == calendar_id);
        if !known {
            return Err(CliError::Config(format!(
                "calendar '{calendar_id}' does not exist in the calendar store"
            )));
        }
        engine.manager.set_preferred_calendar(&calendar_id).await?;
        println!("Preferred calendar set to {calendar_id}");
    }
    if let Some(enabled) = auto_sync {
        engine.manager.set_auto_sync_enabled(enabled).await?;
        println!("Auto-sync {}", if enabled { "enabled" } else { "disabled" });
    }
    Ok(())
}
