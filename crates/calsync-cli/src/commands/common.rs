use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use calsync_core::models::SyncRecord;
use calsync_core::util::normalize_text_option;
use calsync_core::{CalendarSyncManager, EngineConfig, SyncRecordStore};
use chrono::{DateTime, Utc};

use crate::agenda_file::AgendaFile;
use crate::calendar_store::FileCalendarProvider;
use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "config.json";
const CALENDAR_STORE_FILE_NAME: &str = "calendar.json";
const AGENDA_FILE_NAME: &str = "agenda.json";

/// Files the CLI works with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config: PathBuf,
    pub db_path: Option<PathBuf>,
    pub calendar_store: PathBuf,
    pub agenda: PathBuf,
}

/// A sync manager wired to the file-backed collaborators
pub struct Engine {
    pub config: EngineConfig,
    pub manager: CalendarSyncManager,
    pub agenda: Arc<AgendaFile>,
}

pub fn resolve_paths(
    config: Option<PathBuf>,
    db_path: Option<PathBuf>,
    calendar_store: Option<PathBuf>,
    agenda: Option<PathBuf>,
) -> Result<Paths, CliError> {
    let config = match config.or_else(|| env::var_os("CALSYNC_CONFIG").map(PathBuf::from)) {
        Some(path) => path,
        None => default_config_dir()?.join(CONFIG_FILE_NAME),
    };
    let db_path = db_path.or_else(|| env::var_os("CALSYNC_DB_PATH").map(PathBuf::from));
    let calendar_store = match calendar_store
        .or_else(|| env::var_os("CALSYNC_CALENDAR_STORE").map(PathBuf::from))
    {
        Some(path) => path,
        None => default_data_dir()?.join(CALENDAR_STORE_FILE_NAME),
    };
    let agenda = match agenda.or_else(|| env::var_os("CALSYNC_AGENDA").map(PathBuf::from)) {
        Some(path) => path,
        None => default_data_dir()?.join(AGENDA_FILE_NAME),
    };

    Ok(Paths {
        config,
        db_path,
        calendar_store,
        agenda,
    })
}

fn default_config_dir() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("calsync"))
        .ok_or_else(|| CliError::Config("could not resolve a config directory".to_string()))
}

fn default_data_dir() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("calsync"))
        .ok_or_else(|| CliError::Config("could not resolve a data directory".to_string()))
}

pub async fn open_engine(paths: &Paths) -> Result<Engine, CliError> {
    let config = EngineConfig::load_from_path(&paths.config)?;
    let db_path = match &paths.db_path {
        Some(path) => path.clone(),
        None => config.resolved_database_path()?,
    };
    tracing::debug!(
        db_path = %db_path.display(),
        calendar_store = %paths.calendar_store.display(),
        "Opening sync engine"
    );

    let store = SyncRecordStore::open_path(db_path).await?;
    let provider = Arc::new(FileCalendarProvider::new(&paths.calendar_store));
    let manager = CalendarSyncManager::new(provider, store, &config);

    Ok(Engine {
        config,
        manager,
        agenda: Arc::new(AgendaFile::new(&paths.agenda)),
    })
}

pub fn normalize_calendar_id(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(str::to_string))
}

pub fn not_in_agenda(kind: &str, id: i64, agenda_path: &Path) -> CliError {
    CliError::NotInAgenda(format!("{kind} {id}"), agenda_path.display().to_string())
}

pub fn format_timestamp(timestamp_ms: Option<i64>) -> String {
    timestamp_ms
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(
            || "-".to_string(),
            |value| value.format("%Y-%m-%d %H:%M").to_string(),
        )
}

pub fn format_record_lines(records: &[SyncRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let key = format!("{} {}", record.key.entity_type, record.key.entity_id);
            let status = record.status.to_string();
            let entry = record.calendar_event_id.as_deref().unwrap_or("-");
            let synced = format_timestamp(record.synced_at);
            format!("{key:<20}  {status:<12}  {synced:<16}  {entry}")
        })
        .collect()
}
