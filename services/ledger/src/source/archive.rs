//! Archive source — backup bundles
//!
//! A backup bundle is a `.zip` holding validated captures as
//! `<safe-realm>-<stamp>.json` plus checksum listings. Only entries whose
//! basename decodes as a snapshot name are exposed.
//!
//! `archive_directory` stacks every bundle of one realm found in the
//! backup directory into a composite, in bundle-name order.

use super::{decompress, CompositeSource, SnapshotSource, SourceError};
use crate::naming::{sort_by_content, Encoding, SnapshotName};
use auction_types::ids::Realm;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Captures stored inside one zip bundle.
pub struct ArchiveSource {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
    entries: BTreeMap<String, (usize, Encoding)>,
}

impl ArchiveSource {
    /// Open a bundle and index its snapshot entries.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let path = path.into();
        let mut archive = ZipArchive::new(File::open(&path)?)?;

        let mut entries = BTreeMap::new();
        for index in 0..archive.len() {
            let file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            if let Some((name, encoding)) = SnapshotName::parse_file_name(file.name()) {
                entries.entry(name.to_string()).or_insert((index, encoding));
            }
        }

        debug!(
            archive = %path.display(),
            total = archive.len(),
            collected = entries.len(),
            "archive indexed"
        );
        Ok(Self {
            path,
            archive: Mutex::new(archive),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotSource for ArchiveSource {
    fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        sort_by_content(&mut names);
        names
    }

    fn get(&self, name: &str) -> Result<Vec<u8>, SourceError> {
        let (index, encoding) = *self.entries.get(name).ok_or_else(|| SourceError::NotFound {
            name: name.to_string(),
        })?;

        let mut archive = self.archive.lock().map_err(|_| SourceError::Poisoned {
            path: self.path.display().to_string(),
        })?;
        let mut file = archive.by_index(index)?;
        let mut data = Vec::with_capacity(initial_capacity(file.size()));
        file.read_to_end(&mut data)?;

        match encoding {
            Encoding::Plain => Ok(data),
            Encoding::Zstd => decompress(name, &data),
        }
    }

    fn describe(&self) -> String {
        format!("zip:{}", self.path.display())
    }
}

/// Buffer size to reserve for an entry; the declared size is untrusted.
fn initial_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOCATION) as usize
}

/// Stack every `<safe-realm>-*.zip` bundle in `dir` into one composite.
///
/// Bundles are added in file-name order, so for duplicated captures the
/// earliest bundle wins. A bundle that cannot be opened is logged and
/// skipped; a missing directory yields an empty composite.
pub fn archive_directory(dir: &Path, realm: &Realm) -> Result<CompositeSource, SourceError> {
    let mut composite = CompositeSource::new();
    if !dir.exists() {
        debug!(dir = %dir.display(), "backup directory does not exist");
        return Ok(composite);
    }

    let prefix = format!("{}-", realm.safe_name());
    let mut bundles: Vec<(String, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| (e.file_name().to_string_lossy().to_string(), e.path()))
        .filter(|(name, _)| name.starts_with(&prefix) && name.ends_with(".zip"))
        .collect();
    bundles.sort();

    debug!(dir = %dir.display(), bundles = bundles.len(), "collecting backup bundles");
    for (_, path) in bundles {
        match ArchiveSource::open(&path) {
            Ok(source) => composite.add(Box::new(source)),
            Err(e) => warn!(archive = %path.display(), error = %e, "backup bundle not opened"),
        }
    }
    Ok(composite)
}
