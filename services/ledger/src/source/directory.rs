//! Directory source — loose capture files
//!
//! Scans one directory for `<safe-realm>-<stamp>.json[.zst]` files. Names
//! that do not decode are not snapshots and are silently left out. When a
//! realm is given, captures of other realms are left out too.

use super::{decompress, SnapshotSource, SourceError};
use crate::naming::{sort_by_content, Encoding, SnapshotName};
use auction_types::ids::Realm;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Captures stored as individual files in one directory.
pub struct DirectorySource {
    dir: PathBuf,
    entries: BTreeMap<String, (PathBuf, Encoding)>,
}

impl DirectorySource {
    /// Scan `dir`. A missing directory is an empty source.
    pub fn open(dir: impl Into<PathBuf>, realm: Option<&Realm>) -> Result<Self, SourceError> {
        let dir = dir.into();
        let mut entries = BTreeMap::new();

        if !dir.exists() {
            debug!(dir = %dir.display(), "snapshot directory does not exist");
            return Ok(Self { dir, entries });
        }

        let mut files: Vec<(String, PathBuf)> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| (e.file_name().to_string_lossy().to_string(), e.path()))
            .collect();
        files.sort();

        let scanned = files.len();
        for (file_name, path) in files {
            let Some((name, encoding)) = SnapshotName::parse_file_name(&file_name) else {
                continue;
            };
            if realm.is_some_and(|r| *r != name.realm) {
                continue;
            }
            entries.entry(name.to_string()).or_insert((path, encoding));
        }

        debug!(
            dir = %dir.display(),
            scanned,
            collected = entries.len(),
            "snapshot directory scanned"
        );
        Ok(Self { dir, entries })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotSource for DirectorySource {
    fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        sort_by_content(&mut names);
        names
    }

    fn get(&self, name: &str) -> Result<Vec<u8>, SourceError> {
        let (path, encoding) = self.entries.get(name).ok_or_else(|| SourceError::NotFound {
            name: name.to_string(),
        })?;
        let data = fs::read(path)?;
        match encoding {
            Encoding::Plain => Ok(data),
            Encoding::Zstd => decompress(name, &data),
        }
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.dir.display())
    }
}
