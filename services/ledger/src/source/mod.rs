//! Snapshot sources
//!
//! A source lists the captures it holds and hands out their raw bodies.
//! Three kinds share the one `SnapshotSource` capability:
//!
//! - `DirectorySource`: loose capture files written by the live fetcher
//! - `ArchiveSource`: one backup bundle (`.zip`)
//! - `CompositeSource`: an ordered stack of other sources, first-added wins
//!
//! Identifiers are canonical snapshot names (`eu-fordragon-20150301_120000`),
//! so the same capture stored as a live `.json.zst` and as an archived
//! `.json` is one identifier. `list` is always sorted by decoded
//! (realm, time), independent of physical storage order.

use auction_types::ids::Realm;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub mod archive;
pub mod composite;
pub mod directory;

pub use archive::{archive_directory, ArchiveSource};
pub use composite::CompositeSource;
pub use directory::DirectorySource;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Snapshot not in source: {name}")]
    NotFound { name: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Decompression error for {name}: {detail}")]
    Compression { name: String, detail: String },

    #[error("Archive handle poisoned: {path}")]
    Poisoned { path: String },
}

// ── Capability ──────────────────────────────────────────────────────

/// Anything that can list captures and fetch their bodies.
pub trait SnapshotSource: Send + Sync {
    /// Canonical identifiers held by this source, sorted by (realm, time).
    fn list(&self) -> Vec<String>;

    /// Raw (decompressed) body of one capture.
    ///
    /// Fails with `SourceError::NotFound` for identifiers not in `list`.
    fn get(&self, name: &str) -> Result<Vec<u8>, SourceError>;

    /// Short human-readable label for logs.
    fn describe(&self) -> String;
}

/// The standard feed of one realm: backup bundles and the live download
/// directory, archives first when `prefer_archives` is set.
pub fn realm_source(
    download_dir: &Path,
    backup_dir: &Path,
    realm: &Realm,
    prefer_archives: bool,
) -> Result<CompositeSource, SourceError> {
    let archives = archive_directory(backup_dir, realm)?;
    let live = DirectorySource::open(download_dir, Some(realm))?;

    let mut composite = CompositeSource::new();
    if prefer_archives {
        composite.add(Box::new(archives));
        composite.add(Box::new(live));
    } else {
        composite.add(Box::new(live));
        composite.add(Box::new(archives));
    }
    info!(realm = %realm, source = %composite.describe(), "snapshot source assembled");
    Ok(composite)
}

pub(crate) fn decompress(name: &str, data: &[u8]) -> Result<Vec<u8>, SourceError> {
    zstd::decode_all(data).map_err(|e| SourceError::Compression {
        name: name.to_string(),
        detail: e.to_string(),
    })
}
