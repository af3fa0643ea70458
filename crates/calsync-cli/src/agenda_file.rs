//! Server agenda snapshot read from a JSON file.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calsync_core::models::{AgendaItem, EntityType, EventSummary, ServerEntity, SyncKey};
use calsync_core::{Result, ServerAgenda};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgendaSnapshot {
    #[serde(default)]
    pub events: Vec<EventSummary>,
    #[serde(default)]
    pub agenda_items: Vec<AgendaEntry>,
}

/// An agenda item together with the name of the event it belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgendaEntry {
    #[serde(default)]
    pub event_name: String,
    #[serde(flatten)]
    pub item: AgendaItem,
}

impl AgendaSnapshot {
    pub fn agenda_item(&self, id: i64) -> Option<&AgendaEntry> {
        self.agenda_items.iter().find(|entry| entry.item.id == id)
    }

    pub fn event(&self, id: i64) -> Option<&EventSummary> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn entity(&self, key: &SyncKey) -> Option<ServerEntity> {
        match key.entity_type {
            EntityType::AgendaItem => self
                .agenda_item(key.entity_id)
                .map(|entry| ServerEntity::from_agenda_item(&entry.item, &entry.event_name)),
            EntityType::Event => self.event(key.entity_id).map(ServerEntity::from_event),
        }
    }
}

pub struct AgendaFile {
    path: PathBuf,
}

impl AgendaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty agenda.
    pub async fn load(&self) -> Result<AgendaSnapshot> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(AgendaSnapshot::default()),
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait]
impl ServerAgenda for AgendaFile {
    async fn fetch_entities(&self, keys: &[SyncKey]) -> Result<Vec<ServerEntity>> {
        let snapshot = self.load().await?;
        Ok(keys.iter().filter_map(|key| snapshot.entity(key)).collect())
    }
}
