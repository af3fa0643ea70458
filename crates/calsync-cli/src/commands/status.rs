use crate::commands::common::{format_record_lines, Engine};
use crate::error::CliError;

pub async fn run_status(engine: &Engine, as_json: bool) -> Result<(), CliError> {
    let records = engine.manager.sync_records().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("Nothing synced yet.");
        return Ok(());
    }

    for line in format_record_lines(&records) {
        println!("{line}");
    }
    Ok(())
}
