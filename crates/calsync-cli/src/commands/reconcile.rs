use std::sync::Arc;

use calsync_core::{ReconcileReport, ReconciliationRunner, ServerAgenda};

use crate::commands::common::Engine;
use crate::error::CliError;

pub async fn run_reconcile(
    engine: &Engine,
    as_json: bool,
) -> Result<Option<ReconcileReport>, CliError> {
    let runner = ReconciliationRunner::new(
        engine.manager.clone(),
        Arc::clone(&engine.agenda) as Arc<dyn ServerAgenda>,
        &engine.config,
    );

    let Some(report) = runner.run_once().await? else {
        println!("A reconciliation pass is already running.");
        return Ok(None);
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Checked {}, updated {}, missing on device {}, missing on server {}, failed {}",
            report.checked,
            report.updated,
            report.repaired_missing,
            report.missing_on_server,
            report.failed
        );
    }
    Ok(Some(report))
}
