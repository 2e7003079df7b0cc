//! Ledger configuration
//!
//! Loaded from a TOML file. Every key is optional:
//!
//! ```toml
//! realms = ["eu:fordragon"]
//! download_dir = "data/download"
//! backup_dir = "data/backup"
//! result_dir = "data/result"
//! name_format = "{realm}-{name}"
//! timed_name_format = "%Y_%m-{realm}-{name}"
//! checkpoint = "end_of_batch"
//! compress_state = true
//! prefer_archives = true
//! ```
//!
//! Relative directories resolve against the directory holding the file.

use crate::naming::OutputNaming;
use auction_types::ids::Realm;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {path}: {detail}")]
    Parse { path: String, detail: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// When the ledger state is saved during a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointMode {
    /// After every processed snapshot; a crash loses at most one snapshot.
    PerSnapshot,
    /// Once after the batch.
    EndOfBatch,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub realms: Vec<String>,
    pub download_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub result_dir: PathBuf,
    pub name_format: String,
    pub timed_name_format: String,
    pub checkpoint: CheckpointMode,
    pub compress_state: bool,
    pub prefer_archives: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            realms: vec!["eu:fordragon".to_string()],
            download_dir: PathBuf::from("data/download"),
            backup_dir: PathBuf::from("data/backup"),
            result_dir: PathBuf::from("data/result"),
            name_format: "{realm}-{name}".to_string(),
            timed_name_format: "%Y_%m-{realm}-{name}".to_string(),
            checkpoint: CheckpointMode::EndOfBatch,
            compress_state: true,
            prefer_archives: true,
        }
    }
}

impl LedgerConfig {
    /// Read, resolve and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { detail, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                detail,
            },
            other => other,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text without touching the filesystem.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            detail: e.to_string(),
        })
    }

    /// Make relative directories relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for dir in [&mut self.download_dir, &mut self.backup_dir, &mut self.result_dir] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realms.is_empty() {
            return Err(ConfigError::Invalid("no realms configured".to_string()));
        }
        self.parsed_realms()?;
        for (key, format) in [
            ("name_format", &self.name_format),
            ("timed_name_format", &self.timed_name_format),
        ] {
            if !format.contains("{name}") {
                return Err(ConfigError::Invalid(format!(
                    "{} must contain {{name}}: {:?}",
                    key, format
                )));
            }
        }
        if !OutputNaming::is_valid_pattern(&self.timed_name_format) {
            return Err(ConfigError::Invalid(format!(
                "timed_name_format is not a valid time pattern: {:?}",
                self.timed_name_format
            )));
        }
        Ok(())
    }

    pub fn parsed_realms(&self) -> Result<Vec<Realm>, ConfigError> {
        self.realms
            .iter()
            .map(|r| {
                r.parse::<Realm>()
                    .map_err(|e| ConfigError::Invalid(format!("realm {:?}: {}", r, e)))
            })
            .collect()
    }

    pub fn naming(&self) -> OutputNaming {
        OutputNaming::new(self.name_format.clone(), self.timed_name_format.clone())
    }

    /// Create the result directory if missing.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.result_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = LedgerConfig::from_toml("").unwrap();
        assert_eq!(config.realms, vec!["eu:fordragon"]);
        assert_eq!(config.checkpoint, CheckpointMode::EndOfBatch);
        assert!(config.compress_state);
        assert!(config.prefer_archives);
        config.validate().unwrap();
    }

    #[test]
    fn test_overrides() {
        let config = LedgerConfig::from_toml(
            r#"
            realms = ["eu:fordragon", "us:twisting-nether"]
            checkpoint = "per_snapshot"
            compress_state = false
            timed_name_format = "%Y-{realm}-{name}"
            "#,
        )
        .unwrap();
        assert_eq!(config.parsed_realms().unwrap().len(), 2);
        assert_eq!(config.checkpoint, CheckpointMode::PerSnapshot);
        assert!(!config.compress_state);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            LedgerConfig::from_toml("relms = []"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = LedgerConfig::default();
        config.realms.clear();
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.realms = vec!["fordragon".to_string()];
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.name_format = "{realm}".to_string();
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.timed_name_format = "%Q-{name}".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_resolves_relative_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("auction-ledger.toml");
        fs::write(&path, "result_dir = \"out\"\nbackup_dir = \"/abs/backup\"\n").unwrap();

        let config = LedgerConfig::load(&path).unwrap();
        assert_eq!(config.result_dir, tmp.path().join("out"));
        assert_eq!(config.backup_dir, PathBuf::from("/abs/backup"));
        assert_eq!(config.download_dir, tmp.path().join("data/download"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            LedgerConfig::load(&tmp.path().join("absent.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
