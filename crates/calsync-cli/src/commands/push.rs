use std::collections::HashMap;
use std::path::Path;

use calsync_core::push::payload_from_json;
use calsync_core::PushOutcome;

use crate::commands::common::Engine;
use crate::error::CliError;

pub async fn run_push(
    engine: &Engine,
    fields: &[String],
    file: Option<&Path>,
) -> Result<PushOutcome, CliError> {
    let data = match file {
        Some(path) => read_payload_file(path)?,
        None => parse_push_fields(fields)?,
    };
    if data.is_empty() {
        return Err(CliError::EmptyPush);
    }

    let outcome = engine.manager.handle_push(&data).await;
    println!("{}", describe_push_outcome(outcome));
    Ok(outcome)
}

pub fn parse_push_fields(fields: &[String]) -> Result<HashMap<String, String>, CliError> {
    fields
        .iter()
        .map(|field| {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| CliError::InvalidPushField(field.clone()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::InvalidPushField(field.clone()));
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn read_payload_file(path: &Path) -> Result<HashMap<String, String>, CliError> {
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    payload_from_json(&value).ok_or_else(|| {
        CliError::Config(format!("push payload in {} must be a JSON object", path.display()))
    })
}

pub fn describe_push_outcome(outcome: PushOutcome) -> String {
    match outcome {
        PushOutcome::Applied(1) => "Applied to 1 calendar entry".to_string(),
        PushOutcome::Applied(count) => format!("Applied to {count} calendar entries"),
        PushOutcome::Skipped => "Nothing synced on this device for that push".to_string(),
        PushOutcome::Failed => {
            "Calendar store rejected the change; it will be retried on reconcile".to_string()
        }
        PushOutcome::Dropped => "Push payload was not a valid calendar sync message".to_string(),
    }
}
