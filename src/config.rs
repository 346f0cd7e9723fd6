//! Ledger configuration
//!
//! Classifier policy (deviation threshold, idle timeout, zones) belongs
//! to the event producers and is not configured here.

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for a file-backed ledger and its alert bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON Lines file holding the chain (default: ledger.jsonl)
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Records replayed to a subscriber on attach (default: 50)
    #[serde(default = "default_replay_window")]
    pub replay_window: usize,

    /// Outgoing buffer per subscriber; a full buffer drops the subscriber (default: 64)
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// fsync after every append (default: true)
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,
}

fn default_path() -> PathBuf {
    PathBuf::from("ledger.jsonl")
}

fn default_replay_window() -> usize {
    50
}

fn default_subscriber_buffer() -> usize {
    64
}

fn default_sync_writes() -> bool {
    true
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            replay_window: default_replay_window(),
            subscriber_buffer: default_subscriber_buffer(),
            sync_writes: default_sync_writes(),
        }
    }
}

impl LedgerConfig {
    /// Default settings with the ledger at `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: LedgerConfig = toml::from_str(content)
            .map_err(|e| LedgerError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file; a missing file yields defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject settings the bus cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.replay_window == 0 {
            return Err(LedgerError::Config(
                "replay_window must be at least 1".to_string(),
            ));
        }
        if self.subscriber_buffer == 0 {
            return Err(LedgerError::Config(
                "subscriber_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.path, PathBuf::from("ledger.jsonl"));
        assert_eq!(config.replay_window, 50);
        assert_eq!(config.subscriber_buffer, 64);
        assert!(config.sync_writes);
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config = LedgerConfig::from_toml_str(
            r#"
            path = "/var/lib/safety/ledger.jsonl"
            replay_window = 10
        "#,
        )
        .unwrap();
        assert_eq!(config.path, PathBuf::from("/var/lib/safety/ledger.jsonl"));
        assert_eq!(config.replay_window, 10);
        assert_eq!(config.subscriber_buffer, 64);
    }

    #[test]
    fn test_config_rejects_zero_buffer() {
        let err = LedgerConfig::from_toml_str("subscriber_buffer = 0").unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }

    #[test]
    fn test_config_rejects_garbage() {
        let err = LedgerConfig::from_toml_str("replay_window = \"many\"").unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let config = LedgerConfig::load("/tmp/nonexistent-a3s-ledger.toml").unwrap();
        assert_eq!(config.replay_window, 50);
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("a3s-ledger-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ledger.toml");
        std::fs::write(&path, "sync_writes = false\n").unwrap();

        let config = LedgerConfig::load(&path).unwrap();
        assert!(!config.sync_writes);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
