//! Engine configuration.
//!
//! Provides `EngineConfig`, read from a JSON file by hosts that embed the
//! sync engine. Every field has a default so an absent file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::Platform;
use crate::util::normalize_text_option;
use crate::{Error, Result};

const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 5_000;
const PROVIDER_TIMEOUT_ENV: &str = "CALSYNC_PROVIDER_TIMEOUT_MS";
const DATABASE_FILE_NAME: &str = "calsync.db";

/// Runtime settings for the sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Device calendar backend this process writes to
    #[serde(default)]
    pub platform: Platform,
    /// Upper bound for a single calendar provider call
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    /// Sync record database; defaults to the platform data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Run a reconciliation pass when the host comes to the foreground
    #[serde(default = "default_true")]
    pub reconcile_on_foreground: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            database_path: None,
            reconcile_on_foreground: true,
        }
    }
}

const fn default_provider_timeout_ms() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_MS
}

const fn default_true() -> bool {
    true
}

impl EngineConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(error) => return Err(error.into()),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        std::fs::write(path, format!("{payload}\n"))?;
        Ok(())
    }

    pub const fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    /// Configured database path, or `<data dir>/calsync/calsync.db`.
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .ok_or_else(|| Error::InvalidInput("could not resolve a data directory".to_string()))?;
        Ok(data_dir.join("calsync").join(DATABASE_FILE_NAME))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        let Some(raw) = normalize_text_option(std::env::var(PROVIDER_TIMEOUT_ENV).ok()) else {
            return Ok(());
        };
        self.provider_timeout_ms = raw.parse().map_err(|_| {
            Error::InvalidInput(format!("{PROVIDER_TIMEOUT_ENV} must be a number, got '{raw}'"))
        })?;
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.provider_timeout_ms == 0 {
            return Err(Error::InvalidInput(
                "provider_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.platform, Platform::DeviceA);
        assert_eq!(config.database_path, None);
        assert!(config.reconcile_on_foreground);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = EngineConfig::parse(r#"{ "platform": "device_b" }"#).unwrap();
        assert_eq!(
            config,
            EngineConfig {
                platform: Platform::DeviceB,
                ..EngineConfig::default()
            }
        );
        assert_eq!(config.provider_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_unknown_fields_and_zero_timeout() {
        assert!(EngineConfig::parse(r#"{ "platfrom": "device_b" }"#).is_err());
        assert!(matches!(
            EngineConfig::parse(r#"{ "provider_timeout_ms": 0 }"#),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = EngineConfig {
            platform: Platform::DeviceB,
            provider_timeout_ms: 1_500,
            database_path: Some(dir.path().join("sync.db")),
            reconcile_on_foreground: false,
        };

        config.save_to_path(&path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(EngineConfig::parse(&raw).unwrap(), config);
    }

    #[test]
    fn explicit_database_path_wins() {
        let config = EngineConfig {
            database_path: Some(PathBuf::from("/tmp/calsync-test.db")),
            ..EngineConfig::default()
        };
        assert_eq!(
            config.resolved_database_path().unwrap(),
            PathBuf::from("/tmp/calsync-test.db")
        );
    }
}
