//! Batch Runner — replay a source into a ledger
//!
//! Process:
//! 1. List the source (sorted by decoded realm and time)
//! 2. Skip identifiers that do not decode, belong to another realm, or
//!    are at or before the ledger watermark
//! 3. Fetch and parse each remaining snapshot; failures are logged,
//!    recorded as bad and skipped
//! 4. Replay the snapshot as one ledger transaction and append the
//!    outcome to the result streams
//! 5. Checkpoint the ledger per snapshot or once at the end
//!
//! Ledger and output failures abort the batch. The failing snapshot is
//! rolled back and, under `EndOfBatch`, the snapshots completed before it
//! are saved, so the saved state always matches the result streams and a
//! rerun resumes at the failing snapshot.

use crate::config::CheckpointMode;
use crate::ledger::{AuctionLedger, LedgerError, SnapshotTally};
use crate::naming::SnapshotName;
use crate::output::{OutputError, OutputWriter};
use crate::source::SnapshotSource;
use auction_types::ids::Realm;
use auction_types::snapshot::Snapshot;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Ledger failed on snapshot {snapshot}: {source}")]
    Ledger {
        snapshot: String,
        #[source]
        source: LedgerError,
    },

    #[error("Output failed on snapshot {snapshot}: {source}")]
    Output {
        snapshot: String,
        #[source]
        source: OutputError,
    },

    #[error("Checkpoint failed: {0}")]
    Checkpoint(#[source] LedgerError),
}

// ── Report ──────────────────────────────────────────────────────────

/// A snapshot skipped because it could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadSnapshot {
    pub name: String,
    pub cause: String,
}

/// Counters summed over every processed snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTotals {
    pub created: usize,
    pub modified: usize,
    pub bought: usize,
    pub auctioned: usize,
    pub expired: usize,
}

impl BatchTotals {
    pub fn accumulate(&mut self, tally: &SnapshotTally) {
        self.created += tally.created;
        self.modified += tally.modified;
        self.bought += tally.bought;
        self.auctioned += tally.auctioned;
        self.expired += tally.expired;
    }

    pub fn closed(&self) -> usize {
        self.bought + self.auctioned + self.expired
    }

    pub fn success_rate(&self) -> usize {
        match self.closed() {
            0 => 0,
            closed => (self.bought + self.auctioned) * 100 / closed,
        }
    }
}

/// What one batch did.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub realm: Realm,
    /// Identifiers listed by the source.
    pub listed: usize,
    pub processed: usize,
    /// At or before the watermark.
    pub already_processed: usize,
    /// Captures of another realm.
    pub foreign: usize,
    pub bad: Vec<BadSnapshot>,
    pub totals: BatchTotals,
    pub duration_ms: u64,
}

impl BatchReport {
    fn new(realm: Realm) -> Self {
        Self {
            realm,
            listed: 0,
            processed: 0,
            already_processed: 0,
            foreign: 0,
            bad: Vec::new(),
            totals: BatchTotals::default(),
            duration_ms: 0,
        }
    }

    fn skip_bad(&mut self, name: &str, cause: String) {
        warn!(snapshot = name, cause = %cause, "snapshot skipped");
        self.bad.push(BadSnapshot {
            name: name.to_string(),
            cause,
        });
    }
}

// ── Runner ──────────────────────────────────────────────────────────

pub struct BatchRunner<'a> {
    source: &'a dyn SnapshotSource,
    output: &'a OutputWriter,
    checkpoint: CheckpointMode,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        source: &'a dyn SnapshotSource,
        output: &'a OutputWriter,
        checkpoint: CheckpointMode,
    ) -> Self {
        Self {
            source,
            output,
            checkpoint,
        }
    }

    /// Replay every unprocessed snapshot of the ledger's realm.
    pub fn run(&self, ledger: &mut AuctionLedger) -> Result<BatchReport, RunnerError> {
        let start = Instant::now();
        let realm = ledger.realm().clone();
        let mut report = BatchReport::new(realm.clone());

        let names = self.source.list();
        report.listed = names.len();
        info!(
            realm = %realm,
            source = %self.source.describe(),
            listed = names.len(),
            watermark = ?ledger.watermark(),
            "batch started"
        );

        for name in &names {
            let Some(decoded) = SnapshotName::parse(name) else {
                report.skip_bad(name, "undecodable snapshot name".to_string());
                continue;
            };
            if decoded.realm != realm {
                debug!(snapshot = %name, "foreign realm, skipped");
                report.foreign += 1;
                continue;
            }
            if !ledger.needs_processing(decoded.captured_at) {
                debug!(snapshot = %name, "already processed");
                report.already_processed += 1;
                continue;
            }

            let data = match self.source.get(name) {
                Ok(data) => data,
                Err(e) => {
                    report.skip_bad(name, e.to_string());
                    continue;
                }
            };
            let snapshot = match Snapshot::parse(&data) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    report.skip_bad(name, e.to_string());
                    continue;
                }
            };

            let tally = match self.replay(ledger, &decoded, &snapshot, name) {
                Ok(tally) => tally,
                Err(e) => {
                    error!(snapshot = %name, error = %e, "batch aborted");
                    ledger.rollback();
                    if self.checkpoint == CheckpointMode::EndOfBatch && report.processed > 0 {
                        if let Err(save_err) = ledger.save() {
                            warn!(error = %save_err, "could not save completed snapshots");
                        }
                    }
                    return Err(e);
                }
            };
            report.totals.accumulate(&tally);
            report.processed += 1;

            if self.checkpoint == CheckpointMode::PerSnapshot {
                ledger.save().map_err(RunnerError::Checkpoint)?;
            }
        }

        if self.checkpoint == CheckpointMode::EndOfBatch && report.processed > 0 {
            ledger.save().map_err(RunnerError::Checkpoint)?;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            realm = %realm,
            processed = report.processed,
            already_processed = report.already_processed,
            foreign = report.foreign,
            bad = report.bad.len(),
            closed = report.totals.closed(),
            rate = report.totals.success_rate(),
            duration_ms = report.duration_ms,
            "batch finished"
        );
        for bad in &report.bad {
            warn!(snapshot = %bad.name, cause = %bad.cause, "bad snapshot");
        }
        Ok(report)
    }

    fn replay(
        &self,
        ledger: &mut AuctionLedger,
        decoded: &SnapshotName,
        snapshot: &Snapshot,
        name: &str,
    ) -> Result<SnapshotTally, RunnerError> {
        let ledger_err = |source| RunnerError::Ledger {
            snapshot: name.to_string(),
            source,
        };

        ledger.begin(decoded.captured_at).map_err(ledger_err)?;
        for listing in &snapshot.auctions {
            ledger.add_entry(listing).map_err(ledger_err)?;
        }
        let outcome = ledger.end().map_err(ledger_err)?;

        self.output
            .write(&decoded.realm, &outcome)
            .map_err(|source| RunnerError::Output {
                snapshot: name.to_string(),
                source,
            })?;
        info!(snapshot = %name, "{}", outcome.summary_line());
        Ok(outcome.tally)
    }
}
