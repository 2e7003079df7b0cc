//! State Store — durable ledger state with integrity and compression
//!
//! The working set and watermark of one realm live in a single state file
//! named by `OutputNaming::name("state", realm)`:
//!
//! - JSON envelope `{version, realm, watermark, checksum, entries}`
//! - SHA-256 checksum over the serialized entry list
//! - zstd compression when the file ends in `.json.zst`
//! - atomic replace: write tmp, fsync, rename
//!
//! When the output bucket changes, the current file is copied to the old
//! bucket's timed name (`2015_03-eu-fordragon-state.json.zst`) so each
//! month keeps the state it ended with.

use crate::ledger::{LedgerState, WorkEntry};
use crate::naming::{Encoding, OutputNaming};
use auction_types::ids::Realm;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Current state file format version.
pub const STATE_VERSION: u32 = 1;

const STATE_KIND: &str = "state";

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    #[error("Unsupported state version: {0}")]
    UnsupportedVersion(u32),

    #[error("State file belongs to realm {found}, expected {expected}")]
    RealmMismatch { expected: Realm, found: Realm },
}

impl From<serde_json::Error> for StateError {
    fn from(e: serde_json::Error) -> Self {
        StateError::Serialization(e.to_string())
    }
}

// ── Envelope ────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    version: u32,
    realm: Realm,
    watermark: Option<DateTime<Utc>>,
    /// SHA-256 of the serialized `entries`.
    checksum: String,
    entries: Vec<WorkEntry>,
}

/// Deterministic SHA-256 over an entry list, in id order.
pub fn compute_checksum(entries: &[WorkEntry]) -> Result<String, StateError> {
    let bytes = serde_json::to_vec(entries)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

// ── Store ───────────────────────────────────────────────────────────

/// Reads and writes the state file of one realm.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
    realm: Realm,
    naming: OutputNaming,
    compress: bool,
}

impl StateStore {
    /// `compress` selects `.json.zst` over `.json` for new writes.
    pub fn new(dir: impl Into<PathBuf>, realm: Realm, naming: OutputNaming, compress: bool) -> Self {
        Self {
            dir: dir.into(),
            realm,
            naming,
            compress,
        }
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn encoding(&self) -> Encoding {
        if self.compress {
            Encoding::Zstd
        } else {
            Encoding::Plain
        }
    }

    /// Path of the canonical state file.
    pub fn path(&self) -> PathBuf {
        self.path_with(self.encoding())
    }

    fn path_with(&self, encoding: Encoding) -> PathBuf {
        let name = self.naming.name(STATE_KIND, &self.realm);
        self.dir.join(format!("{}{}", name, encoding.suffix()))
    }

    /// Output bucket of a snapshot taken at `at`.
    pub fn bucket_name(&self, at: DateTime<Utc>) -> String {
        self.naming.timed_name(STATE_KIND, &self.realm, at)
    }

    /// Path of the archived state of one bucket.
    pub fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.dir.join(format!("{}{}", bucket, self.encoding().suffix()))
    }

    /// Write `state` atomically to the canonical file.
    pub fn write(&self, state: &LedgerState) -> Result<PathBuf, StateError> {
        if state.realm != self.realm {
            return Err(StateError::RealmMismatch {
                expected: self.realm.clone(),
                found: state.realm.clone(),
            });
        }
        fs::create_dir_all(&self.dir)?;

        let entries: Vec<WorkEntry> = state.entries.values().cloned().collect();
        let envelope = PersistedState {
            version: STATE_VERSION,
            realm: state.realm.clone(),
            watermark: state.watermark,
            checksum: compute_checksum(&entries)?,
            entries,
        };
        let data = serde_json::to_vec(&envelope)?;
        let final_data = match self.encoding() {
            Encoding::Zstd => zstd::encode_all(data.as_slice(), 3)
                .map_err(|e| StateError::Compression(e.to_string()))?,
            Encoding::Plain => data,
        };

        let path = self.path();
        write_atomic(&path, &final_data)?;
        // The other encoding would shadow this write once compression flips back.
        match fs::remove_file(self.path_with(self.encoding().other())) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        debug!(
            realm = %self.realm,
            entries = envelope.entries.len(),
            bytes = final_data.len(),
            path = %path.display(),
            "ledger state written"
        );
        Ok(path)
    }

    /// Load the saved state, or `None` when nothing was saved yet.
    ///
    /// The configured encoding is tried first, then the other one, so
    /// toggling compression does not lose history. Every write removes
    /// the file in the other encoding, so at most one of them is current.
    pub fn load(&self) -> Result<Option<LedgerState>, StateError> {
        let preferred = self.encoding();
        for encoding in [preferred, preferred.other()] {
            let path = self.path_with(encoding);
            if path.exists() {
                return self.load_from(&path, encoding).map(Some);
            }
        }
        Ok(None)
    }

    fn load_from(&self, path: &Path, encoding: Encoding) -> Result<LedgerState, StateError> {
        let raw = fs::read(path)?;
        let data = match encoding {
            Encoding::Zstd => zstd::decode_all(raw.as_slice())
                .map_err(|e| StateError::Compression(e.to_string()))?,
            Encoding::Plain => raw,
        };

        let envelope: PersistedState = serde_json::from_slice(&data)?;
        if envelope.version > STATE_VERSION {
            return Err(StateError::UnsupportedVersion(envelope.version));
        }
        if envelope.realm != self.realm {
            return Err(StateError::RealmMismatch {
                expected: self.realm.clone(),
                found: envelope.realm,
            });
        }
        let actual = compute_checksum(&envelope.entries)?;
        if actual != envelope.checksum {
            return Err(StateError::IntegrityFailure {
                expected: envelope.checksum,
                actual,
            });
        }

        Ok(LedgerState {
            realm: envelope.realm,
            watermark: envelope.watermark,
            entries: envelope
                .entries
                .into_iter()
                .map(|work| (work.id(), work))
                .collect(),
        })
    }

    /// Copy the canonical file to `bucket`'s archive name.
    pub fn archive_as(&self, bucket: &str) -> Result<PathBuf, StateError> {
        let source = self.path();
        let target = self.bucket_path(bucket);
        let data = fs::read(&source)?;
        write_atomic(&target, &data)?;
        info!(bucket, path = %target.display(), "ledger state archived");
        Ok(target)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StateError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ListingState;
    use auction_types::listing::{Listing, TimeLeft};
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn realm() -> Realm {
        "eu:fordragon".parse().unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 3, 1, hour, 0, 0).unwrap()
    }

    fn sample_state() -> LedgerState {
        let mut entries = BTreeMap::new();
        for id in [3i64, 1, 2] {
            let mut listing = Listing::new(id, "Xera", "Fordragon", 10, 20, TimeLeft::Long);
            listing.bonus_lists = Some(vec![]);
            let work = WorkEntry {
                entry: listing,
                state: ListingState {
                    created: at(10),
                    deadline: at(22),
                    updated: at(11),
                    seenlist: vec![at(10), at(11)],
                    changelist: Vec::new(),
                    raised: false,
                    moved: false,
                    first_bid: 10,
                    last_bid: 10,
                },
            };
            entries.insert(work.id(), work);
        }
        LedgerState {
            realm: realm(),
            watermark: Some(at(11)),
            entries,
        }
    }

    fn store(dir: &Path, compress: bool) -> StateStore {
        StateStore::new(dir, realm(), OutputNaming::default(), compress)
    }

    #[test]
    fn test_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(store(tmp.path(), true).load().unwrap().is_none());
    }

    #[test]
    fn test_write_and_load_compressed() {
        let tmp = TempDir::new().unwrap();
        let store = store(tmp.path(), true);
        let state = sample_state();

        let path = store.write(&state).unwrap();
        assert!(path.to_string_lossy().ends_with("eu-fordragon-state.json.zst"));
        assert_eq!(store.load().unwrap(), Some(state));
    }

    #[test]
    fn test_write_and_load_plain() {
        let tmp = TempDir::new().unwrap();
        let store = store(tmp.path(), false);
        let state = sample_state();

        let path = store.write(&state).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"watermark\""));
        assert_eq!(store.load().unwrap(), Some(state));
    }

    #[test]
    fn test_load_falls_back_to_other_encoding() {
        let tmp = TempDir::new().unwrap();
        let state = sample_state();
        store(tmp.path(), false).write(&state).unwrap();
        assert_eq!(store(tmp.path(), true).load().unwrap(), Some(state));
    }

    #[test]
    fn test_compression_toggle_keeps_latest_watermark() {
        let tmp = TempDir::new().unwrap();
        let mut state = sample_state();
        store(tmp.path(), false).write(&state).unwrap();

        state.watermark = Some(at(13));
        store(tmp.path(), true).write(&state).unwrap();
        assert!(!store(tmp.path(), false).path().exists());

        let reopened = store(tmp.path(), false).load().unwrap().unwrap();
        assert_eq!(reopened.watermark, Some(at(13)));

        state.watermark = Some(at(14));
        store(tmp.path(), false).write(&state).unwrap();
        assert!(!store(tmp.path(), true).path().exists());
        let reopened = store(tmp.path(), true).load().unwrap().unwrap();
        assert_eq!(reopened.watermark, Some(at(14)));
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let tmp = TempDir::new().unwrap();
        store(tmp.path(), true).write(&sample_state()).unwrap();
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_tampered_entries_fail_integrity() {
        let tmp = TempDir::new().unwrap();
        let store = store(tmp.path(), false);
        let path = store.write(&sample_state()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("\"bid\":10", "\"bid\":11")).unwrap();
        assert!(matches!(
            store.load(),
            Err(StateError::IntegrityFailure { .. })
        ));
    }

    #[test]
    fn test_future_version_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = store(tmp.path(), false);
        let path = store.write(&sample_state()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("\"version\":1", "\"version\":99")).unwrap();
        assert!(matches!(store.load(), Err(StateError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_foreign_realm_rejected() {
        let tmp = TempDir::new().unwrap();
        let other: Realm = "eu:ahnqiraj".parse().unwrap();
        let store = store(tmp.path(), false);
        let mut state = sample_state();
        state.realm = other;
        assert!(matches!(
            store.write(&state),
            Err(StateError::RealmMismatch { .. })
        ));
    }

    #[test]
    fn test_archive_copies_canonical_file() {
        let tmp = TempDir::new().unwrap();
        let store = store(tmp.path(), true);
        let state = sample_state();
        store.write(&state).unwrap();

        let bucket = store.bucket_name(at(12));
        assert_eq!(bucket, "2015_03-eu-fordragon-state");
        let archived = store.archive_as(&bucket).unwrap();
        assert!(archived.exists());
        assert!(store.path().exists());
        assert_eq!(fs::read(&archived).unwrap(), fs::read(store.path()).unwrap());
    }

    #[test]
    fn test_checksum_is_order_sensitive_and_stable() {
        let state = sample_state();
        let entries: Vec<WorkEntry> = state.entries.values().cloned().collect();
        let a = compute_checksum(&entries).unwrap();
        let b = compute_checksum(&entries).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let reversed: Vec<WorkEntry> = entries.into_iter().rev().collect();
        assert_ne!(a, compute_checksum(&reversed).unwrap());
    }
}
