//! Sync record model
//!
//! A `SyncRecord` maps one server entity on one device platform to the
//! calendar entry created for it on that device.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of server entity mirrored into the device calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// A single session within an event
    AgendaItem,
    /// A whole event
    Event,
}

impl EntityType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AgendaItem => "AGENDA_ITEM",
            Self::Event => "EVENT",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AGENDA_ITEM" => Ok(Self::AgendaItem),
            "EVENT" => Ok(Self::Event),
            other => Err(Error::InvalidInput(format!("unknown entity type '{other}'"))),
        }
    }
}

/// Device calendar backend the record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    DeviceA,
    DeviceB,
}

impl Platform {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeviceA => "DEVICE_A",
            Self::DeviceB => "DEVICE_B",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEVICE_A" => Ok(Self::DeviceA),
            "DEVICE_B" => Ok(Self::DeviceB),
            other => Err(Error::InvalidInput(format!("unknown platform '{other}'"))),
        }
    }
}

/// Lifecycle state of a sync record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    #[default]
    NotSynced,
    Synced,
    Deleted,
    Error,
    NeedsUpdate,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotSynced => "NOT_SYNCED",
            Self::Synced => "SYNCED",
            Self::Deleted => "DELETED",
            Self::Error => "ERROR",
            Self::NeedsUpdate => "NEEDS_UPDATE",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_SYNCED" => Ok(Self::NotSynced),
            "SYNCED" => Ok(Self::Synced),
            "DELETED" => Ok(Self::Deleted),
            "ERROR" => Ok(Self::Error),
            "NEEDS_UPDATE" => Ok(Self::NeedsUpdate),
            other => Err(Error::InvalidInput(format!("unknown sync status '{other}'"))),
        }
    }
}

/// Identity of a sync record: `(entity_type, entity_id, platform)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncKey {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub platform: Platform,
}

impl SyncKey {
    pub const fn new(entity_type: EntityType, entity_id: i64, platform: Platform) -> Self {
        Self {
            entity_type,
            entity_id,
            platform,
        }
    }

    pub const fn agenda_item(entity_id: i64, platform: Platform) -> Self {
        Self::new(EntityType::AgendaItem, entity_id, platform)
    }

    pub const fn event(entity_id: i64, platform: Platform) -> Self {
        Self::new(EntityType::Event, entity_id, platform)
    }
}

impl fmt::Display for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.entity_type, self.entity_id, self.platform)
    }
}

/// Mapping between a server entity and its device calendar entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub key: SyncKey,
    /// Device calendar store identifier, unset until the first successful create
    pub calendar_event_id: Option<String>,
    /// Device calendar the entry lives in
    pub calendar_id: Option<String>,
    pub status: SyncStatus,
    /// Last successful provider write (Unix ms)
    pub synced_at: Option<i64>,
    /// Last local mutation of this record (Unix ms)
    pub last_updated_at: i64,
    /// Server `updated_at` of the entity as last written to the device (Unix ms)
    pub last_server_updated_at: Option<i64>,
}

impl SyncRecord {
    /// Fresh record for an entity that has never been written to the device.
    pub const fn new(key: SyncKey, now: i64) -> Self {
        Self {
            key,
            calendar_event_id: None,
            calendar_id: None,
            status: SyncStatus::NotSynced,
            synced_at: None,
            last_updated_at: now,
            last_server_updated_at: None,
        }
    }

    /// Deleted records are tombstones; everything else still owns its key.
    pub fn is_active(&self) -> bool {
        self.status != SyncStatus::Deleted
    }

    pub fn is_synced(&self) -> bool {
        self.status == SyncStatus::Synced
    }

    /// Whether the record points at an entry that exists on the device.
    pub const fn has_device_entry(&self) -> bool {
        self.calendar_event_id.is_some()
    }

    /// Whether the server copy is newer than what was last written.
    pub fn is_stale(&self, server_updated_at: i64) -> bool {
        self.last_server_updated_at
            .map_or(true, |written| written < server_updated_at)
    }
}
