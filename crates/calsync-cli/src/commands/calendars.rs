use crate::commands::common::Engine;
use crate::error::CliError;

pub async fn run_calendars(engine: &Engine, as_json: bool) -> Result<(), CliError> {
    let calendars = engine.manager.get_available_calendars().await?;
    let preferred = engine.manager.get_preferred_calendar_id().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&calendars)?);
        return Ok(());
    }

    if calendars.is_empty() {
        println!("No calendars available.");
        return Ok(());
    }

    for calendar in &calendars {
        let marker = if preferred.as_deref() == Some(calendar.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {:<24}  {:<24}  {}",
            calendar.id, calendar.name, calendar.account_name
        );
    }
    Ok(())
}
