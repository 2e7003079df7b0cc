//! Output Writer — append-only result streams
//!
//! Every processed snapshot appends to three files in the result
//! directory, bucketed by the snapshot time:
//!
//! | file                         | one line per          | content               |
//! |------------------------------|-----------------------|-----------------------|
//! | `<bucket>-auctions.jsonl`    | closed listing        | final listing detail  |
//! | `<bucket>-metadata.jsonl`    | closed listing        | `ClosedListing`       |
//! | `<bucket>-snapshot.log`      | snapshot              | summary line          |
//!
//! Files are opened in append mode and fsynced once per snapshot.

use crate::ledger::SnapshotOutcome;
use crate::naming::OutputNaming;
use auction_types::ids::Realm;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const AUCTIONS_KIND: &str = "auctions";
pub const METADATA_KIND: &str = "metadata";
pub const SNAPSHOT_KIND: &str = "snapshot";

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for OutputError {
    fn from(e: serde_json::Error) -> Self {
        OutputError::Serialization(e.to_string())
    }
}

// ── Writer ──────────────────────────────────────────────────────────

/// Appends snapshot outcomes to the result streams.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
    naming: OutputNaming,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>, naming: OutputNaming) -> Self {
        Self {
            dir: dir.into(),
            naming,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of one stream for a snapshot taken at `at`.
    pub fn path(&self, kind: &str, realm: &Realm, at: DateTime<Utc>) -> PathBuf {
        let extension = if kind == SNAPSHOT_KIND { "log" } else { "jsonl" };
        let name = self.naming.timed_name(kind, realm, at);
        self.dir.join(format!("{}.{}", name, extension))
    }

    /// Append one snapshot's closed listings and summary line.
    pub fn write(&self, realm: &Realm, outcome: &SnapshotOutcome) -> Result<(), OutputError> {
        fs::create_dir_all(&self.dir)?;

        if !outcome.closed.is_empty() {
            let details = outcome.closed.iter().map(|r| r.listing.detail());
            append_json_lines(&self.path(AUCTIONS_KIND, realm, outcome.time), details)?;

            let metas = outcome.closed.iter().map(|r| &r.meta);
            append_json_lines(&self.path(METADATA_KIND, realm, outcome.time), metas)?;
        }

        let summary_path = self.path(SNAPSHOT_KIND, realm, outcome.time);
        let mut summary = open_append(&summary_path)?;
        writeln!(summary, "{}", outcome.summary_line())?;
        finish(summary)?;

        debug!(
            realm = %realm,
            closed = outcome.closed.len(),
            dir = %self.dir.display(),
            "snapshot outputs appended"
        );
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<BufWriter<File>, OutputError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn append_json_lines<T: Serialize>(
    path: &Path,
    records: impl IntoIterator<Item = T>,
) -> Result<(), OutputError> {
    let mut writer = open_append(path)?;
    for record in records {
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
    }
    finish(writer)
}

fn finish(mut writer: BufWriter<File>) -> Result<(), OutputError> {
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AuctionLedger;
    use auction_types::closure::ClosedListing;
    use auction_types::listing::{Listing, Modifier, TimeLeft};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn realm() -> Realm {
        "eu:fordragon".parse().unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 3, 1, 12, 0, 0).unwrap()
    }

    fn closing_outcome() -> SnapshotOutcome {
        let mut ledger = AuctionLedger::new(realm());
        let mut modded = Listing::new(2, "Xera", "Fordragon", 5, 50, TimeLeft::Short);
        modded.modifiers = Some(vec![Modifier { kind: 9, value: 110 }]);
        modded.pet_level = Some(25);

        ledger.begin(t0()).unwrap();
        ledger
            .add_entry(&Listing::new(1, "Xera", "Fordragon", 10, 20, TimeLeft::Short))
            .unwrap();
        ledger.add_entry(&modded).unwrap();
        ledger.end().unwrap();

        ledger.begin(t0() + Duration::hours(1)).unwrap();
        ledger.end().unwrap()
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_write_appends_three_streams() {
        let tmp = TempDir::new().unwrap();
        let writer = OutputWriter::new(tmp.path(), OutputNaming::default());
        let outcome = closing_outcome();
        writer.write(&realm(), &outcome).unwrap();

        let auctions = read_lines(&tmp.path().join("2015_03-eu-fordragon-auctions.jsonl"));
        assert_eq!(auctions.len(), 2);
        let metadata = read_lines(&tmp.path().join("2015_03-eu-fordragon-metadata.jsonl"));
        assert_eq!(metadata.len(), 2);
        let meta: ClosedListing = serde_json::from_str(&metadata[0]).unwrap();
        assert_eq!(meta.auc.value(), 1);

        let summary = read_lines(&tmp.path().join("2015_03-eu-fordragon-snapshot.log"));
        assert_eq!(summary, vec![outcome.summary_line()]);
    }

    #[test]
    fn test_auction_lines_carry_trimmed_detail() {
        let tmp = TempDir::new().unwrap();
        let writer = OutputWriter::new(tmp.path(), OutputNaming::default());
        writer.write(&realm(), &closing_outcome()).unwrap();

        let auctions = read_lines(&tmp.path().join("2015_03-eu-fordragon-auctions.jsonl"));
        let modded: Listing = serde_json::from_str(&auctions[1]).unwrap();
        assert!(modded.modifiers.is_some());
        assert_eq!(modded.pet_level, None);
    }

    #[test]
    fn test_repeated_writes_append() {
        let tmp = TempDir::new().unwrap();
        let writer = OutputWriter::new(tmp.path(), OutputNaming::default());
        let outcome = closing_outcome();
        writer.write(&realm(), &outcome).unwrap();
        writer.write(&realm(), &outcome).unwrap();

        let summary = read_lines(&tmp.path().join("2015_03-eu-fordragon-snapshot.log"));
        assert_eq!(summary.len(), 2);
    }

    #[test]
    fn test_quiet_snapshot_writes_only_summary() {
        let tmp = TempDir::new().unwrap();
        let writer = OutputWriter::new(tmp.path(), OutputNaming::default());
        let mut ledger = AuctionLedger::new(realm());
        ledger.begin(t0()).unwrap();
        let outcome = ledger.end().unwrap();
        writer.write(&realm(), &outcome).unwrap();

        assert!(!tmp.path().join("2015_03-eu-fordragon-auctions.jsonl").exists());
        assert!(tmp.path().join("2015_03-eu-fordragon-snapshot.log").exists());
    }
}
