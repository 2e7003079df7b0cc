//! Auction Ledger — incremental diff engine over snapshots
//!
//! Keeps the working set of currently open listings for one realm and
//! replays captures into it one transaction at a time:
//!
//! ```text
//!   Idle ──begin(t)──▶ InSnapshot ──add_entry × N──▶ InSnapshot ──end()──▶ Idle
//! ```
//!
//! - A listing seen for the first time gets a working entry with an
//!   estimated deadline.
//! - A listing seen again is diffed field by field (bid, remaining-time
//!   category, owner, owner realm) and every change is recorded.
//! - A listing missing from a capture is closed: removed from the working
//!   set and turned into exactly one closed-listing record.
//!
//! Out-of-order calls are contract violations and fail with
//! `LedgerError::Precondition`; they never touch the working set.
//!
//! `begin` keeps a copy of the state it started from. `rollback` returns
//! to it when a snapshot fails halfway or its results could not be
//! written, so a later save never records a snapshot as done that was
//! only partly applied.

use crate::deadline::{self, EstimateError};
use crate::state::{StateError, StateStore};
use auction_types::closure::{Change, ChangeField, ClosedListing, ClosureResult};
use auction_types::ids::{ListingId, Realm};
use auction_types::listing::Listing;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Timestamp layout used in logs and summary lines.
pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Precondition violated: {operation} called while {phase}")]
    Precondition {
        operation: &'static str,
        phase: Phase,
    },

    #[error("Snapshot at {time} is not after watermark {watermark}")]
    StaleSnapshot {
        time: DateTime<Utc>,
        watermark: DateTime<Utc>,
    },

    #[error("Listing {auc}: {source}")]
    UnknownCategory {
        auc: ListingId,
        #[source]
        source: EstimateError,
    },

    #[error("State persistence error: {0}")]
    State(#[from] StateError),
}

impl LedgerError {
    /// Contract violations: out-of-order calls, stale snapshots, unknown
    /// categories. Everything else is an environment failure.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            LedgerError::Precondition { .. }
                | LedgerError::StaleSnapshot { .. }
                | LedgerError::UnknownCategory { .. }
        )
    }
}

/// Transaction phase of a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    InSnapshot,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::InSnapshot => f.write_str("inside a snapshot"),
        }
    }
}

// ── Working Set ─────────────────────────────────────────────────────

/// Derived per-listing state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingState {
    pub created: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub seenlist: Vec<DateTime<Utc>>,
    pub changelist: Vec<Change>,
    /// Bid changed at least once
    pub raised: bool,
    /// Owner or owner realm changed at least once
    pub moved: bool,
    pub first_bid: i64,
    pub last_bid: i64,
}

/// Last observation of a listing plus its derived state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkEntry {
    pub entry: Listing,
    pub state: ListingState,
}

impl WorkEntry {
    pub fn id(&self) -> ListingId {
        self.entry.auc
    }
}

/// Everything the ledger persists.
///
/// `BTreeMap` keeps iteration, closure order and serialization
/// deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerState {
    pub realm: Realm,
    /// Time of the last fully processed snapshot; `None` before the first.
    pub watermark: Option<DateTime<Utc>>,
    pub entries: BTreeMap<ListingId, WorkEntry>,
}

impl LedgerState {
    pub fn empty(realm: Realm) -> Self {
        Self {
            realm,
            watermark: None,
            entries: BTreeMap::new(),
        }
    }
}

// ── Snapshot Outcome ────────────────────────────────────────────────

/// Counters for one snapshot transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotTally {
    /// Listings still open after the snapshot
    pub active: usize,
    pub created: usize,
    /// Listings with at least one changed field
    pub modified: usize,
    pub bids: usize,
    pub adjusts: usize,
    pub moves: usize,
    pub bought: usize,
    pub auctioned: usize,
    pub expired: usize,
}

impl SnapshotTally {
    pub fn closed(&self) -> usize {
        self.bought + self.auctioned + self.expired
    }

    pub fn successful(&self) -> usize {
        self.bought + self.auctioned
    }

    /// Share of closed listings that sold, in whole percent.
    pub fn success_rate(&self) -> usize {
        match self.closed() {
            0 => 0,
            closed => self.successful() * 100 / closed,
        }
    }

    fn record(&mut self, result: ClosureResult) {
        match result {
            ClosureResult::Bought => self.bought += 1,
            ClosureResult::Auctioned => self.auctioned += 1,
            ClosureResult::Expired => self.expired += 1,
        }
    }
}

/// A listing that closed in this snapshot: its final fields and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedRecord {
    pub listing: Listing,
    pub meta: ClosedListing,
}

/// Result of one `end()`.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotOutcome {
    pub time: DateTime<Utc>,
    pub tally: SnapshotTally,
    pub closed: Vec<ClosedRecord>,
}

impl SnapshotOutcome {
    /// One-line human-readable summary.
    pub fn summary_line(&self) -> String {
        let t = &self.tally;
        format!(
            "{}: active:{} created:{} changed:{} [bids:{} adj:{} moves:{}] \
             closed:{} [bought:{} auctioned:{} expired:{} rate:{}%]",
            self.time.format(LOG_TIME_FORMAT),
            t.active,
            t.created,
            t.modified,
            t.bids,
            t.adjusts,
            t.moves,
            t.closed(),
            t.bought,
            t.auctioned,
            t.expired,
            t.success_rate(),
        )
    }
}

// ── Ledger ──────────────────────────────────────────────────────────

/// Open transaction.
struct Session {
    time: DateTime<Utc>,
    seen: HashSet<ListingId>,
    tally: SnapshotTally,
}

/// State as it was before the last `begin`.
struct Checkpoint {
    state: LedgerState,
    bucket: Option<String>,
}

/// Per-realm auction ledger.
pub struct AuctionLedger {
    state: LedgerState,
    store: Option<StateStore>,
    /// Output bucket of the last begun snapshot.
    active_bucket: Option<String>,
    session: Option<Session>,
    checkpoint: Option<Checkpoint>,
}

impl AuctionLedger {
    /// In-memory ledger with no persistence attached.
    pub fn new(realm: Realm) -> Self {
        Self::from_state(LedgerState::empty(realm), None)
    }

    /// Ledger backed by `store`, loading its state if one was saved.
    pub fn open(store: StateStore) -> Result<Self, LedgerError> {
        let state = match store.load()? {
            Some(state) => {
                info!(
                    realm = %state.realm,
                    entries = state.entries.len(),
                    watermark = ?state.watermark,
                    "ledger state loaded"
                );
                state
            }
            None => {
                info!(realm = %store.realm(), path = %store.path().display(), "no saved ledger state");
                LedgerState::empty(store.realm().clone())
            }
        };
        Ok(Self::from_state(state, Some(store)))
    }

    fn from_state(state: LedgerState, store: Option<StateStore>) -> Self {
        let active_bucket = match (&store, state.watermark) {
            (Some(store), Some(watermark)) => Some(store.bucket_name(watermark)),
            _ => None,
        };
        Self {
            state,
            store,
            active_bucket,
            session: None,
            checkpoint: None,
        }
    }

    pub fn realm(&self) -> &Realm {
        &self.state.realm
    }

    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.state.watermark
    }

    pub fn phase(&self) -> Phase {
        if self.session.is_some() {
            Phase::InSnapshot
        } else {
            Phase::Idle
        }
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }

    /// Read-only view of one open listing.
    pub fn entry(&self, id: ListingId) -> Option<&WorkEntry> {
        self.state.entries.get(&id)
    }

    /// Read-only view of the whole persisted state.
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// True iff `time` is strictly after the watermark.
    pub fn needs_processing(&self, time: DateTime<Utc>) -> bool {
        self.state.watermark.map_or(true, |watermark| watermark < time)
    }

    /// Persist the current state. Only valid while idle; a detached
    /// ledger has nothing to persist.
    pub fn save(&self) -> Result<(), LedgerError> {
        self.require(Phase::Idle, "save")?;
        if let Some(store) = &self.store {
            store.write(&self.state)?;
        }
        Ok(())
    }

    /// Open a snapshot transaction at `time`.
    ///
    /// When `time` falls into a different output bucket than the previous
    /// snapshot, the state is first saved and archived under the old
    /// bucket's name.
    pub fn begin(&mut self, time: DateTime<Utc>) -> Result<(), LedgerError> {
        self.require(Phase::Idle, "begin")?;
        self.checkpoint = Some(Checkpoint {
            state: self.state.clone(),
            bucket: self.active_bucket.clone(),
        });
        if let Some(watermark) = self.state.watermark {
            if time <= watermark {
                return Err(LedgerError::StaleSnapshot { time, watermark });
            }
        }

        if let Some(store) = &self.store {
            let bucket = store.bucket_name(time);
            if let Some(previous) = self.active_bucket.as_deref() {
                if previous != bucket {
                    info!(from = previous, to = %bucket, "output bucket changed, archiving state");
                    store.write(&self.state)?;
                    store.archive_as(previous)?;
                }
            }
            self.active_bucket = Some(bucket);
        }

        self.session = Some(Session {
            time,
            seen: HashSet::new(),
            tally: SnapshotTally::default(),
        });
        Ok(())
    }

    /// Feed one observation of the open snapshot.
    pub fn add_entry(&mut self, listing: &Listing) -> Result<(), LedgerError> {
        let watermark = self.state.watermark;
        let session = self.session.as_mut().ok_or(LedgerError::Precondition {
            operation: "add_entry",
            phase: Phase::Idle,
        })?;

        let id = listing.auc;
        match self.state.entries.get_mut(&id) {
            Some(work) => {
                if apply_diff(work, listing, session)? {
                    session.tally.modified += 1;
                }
            }
            None => {
                let work = create_entry(listing, session.time, watermark)?;
                self.state.entries.insert(id, work);
                session.tally.created += 1;
            }
        }
        session.seen.insert(id);
        Ok(())
    }

    /// Close the snapshot: every listing not seen in it is closed and
    /// classified, and the watermark advances to the snapshot time.
    pub fn end(&mut self) -> Result<SnapshotOutcome, LedgerError> {
        let Session {
            time,
            seen,
            mut tally,
        } = self.session.take().ok_or(LedgerError::Precondition {
            operation: "end",
            phase: Phase::Idle,
        })?;

        let vanished: Vec<ListingId> = self
            .state
            .entries
            .keys()
            .filter(|id| !seen.contains(id))
            .copied()
            .collect();

        let mut closed = Vec::with_capacity(vanished.len());
        for id in vanished {
            if let Some(work) = self.state.entries.remove(&id) {
                let record = close_entry(work, time);
                tally.record(record.meta.result);
                closed.push(record);
            }
        }

        tally.active = self.state.entries.len();
        self.state.watermark = Some(time);

        debug!(
            realm = %self.state.realm,
            time = %time.format(LOG_TIME_FORMAT),
            active = tally.active,
            closed = closed.len(),
            "snapshot finished"
        );
        Ok(SnapshotOutcome {
            time,
            tally,
            closed,
        })
    }

    /// Undo the last begun snapshot, open or already ended, restoring the
    /// state and watermark from before its `begin`. Returns false when
    /// there is nothing to undo.
    pub fn rollback(&mut self) -> bool {
        let Some(Checkpoint { state, bucket }) = self.checkpoint.take() else {
            return false;
        };
        warn!(
            realm = %state.realm,
            watermark = ?state.watermark,
            discarded = ?self.session.as_ref().map(|s| s.time),
            "snapshot rolled back"
        );
        self.state = state;
        self.active_bucket = bucket;
        self.session = None;
        true
    }

    fn require(&self, phase: Phase, operation: &'static str) -> Result<(), LedgerError> {
        let current = self.phase();
        if current != phase {
            return Err(LedgerError::Precondition {
                operation,
                phase: current,
            });
        }
        Ok(())
    }
}

// ── Entry Transitions ───────────────────────────────────────────────

fn create_entry(
    listing: &Listing,
    time: DateTime<Utc>,
    watermark: Option<DateTime<Utc>>,
) -> Result<WorkEntry, LedgerError> {
    let deadline = deadline::initial_deadline(&listing.time_left, time, watermark).map_err(
        |source| LedgerError::UnknownCategory {
            auc: listing.auc,
            source,
        },
    )?;
    Ok(WorkEntry {
        entry: listing.clone(),
        state: ListingState {
            created: time,
            deadline,
            updated: time,
            seenlist: vec![time],
            changelist: Vec::new(),
            raised: false,
            moved: false,
            first_bid: listing.bid,
            last_bid: listing.bid,
        },
    })
}

/// Diff `listing` into `work`; returns whether anything changed.
fn apply_diff(
    work: &mut WorkEntry,
    listing: &Listing,
    session: &mut Session,
) -> Result<bool, LedgerError> {
    let time = session.time;
    let tally = &mut session.tally;
    let WorkEntry { entry, state } = work;

    // Estimate before touching the entry so a failure leaves it intact.
    let refreshed = if listing.time_left != entry.time_left {
        let deadline = deadline::refreshed_deadline(&listing.time_left, time).map_err(|source| {
            LedgerError::UnknownCategory {
                auc: listing.auc,
                source,
            }
        })?;
        Some(deadline)
    } else {
        None
    };

    state.seenlist.push(time);
    state.updated = time;

    let mut changed = false;

    if listing.bid != state.last_bid {
        state
            .changelist
            .push(Change::new(time, ChangeField::Bid, entry.bid, listing.bid));
        entry.bid = listing.bid;
        state.last_bid = listing.bid;
        state.raised = true;
        tally.bids += 1;
        changed = true;
    }

    if let Some(deadline) = refreshed {
        state.changelist.push(Change::new(
            time,
            ChangeField::TimeLeft,
            &entry.time_left,
            &listing.time_left,
        ));
        state.changelist.push(Change::new(
            time,
            ChangeField::Deadline,
            state.deadline.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            deadline.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ));
        entry.time_left = listing.time_left.clone();
        state.deadline = deadline;
        tally.adjusts += 1;
        changed = true;
    }

    if listing.owner != entry.owner || listing.owner_realm != entry.owner_realm {
        if listing.owner_realm != entry.owner_realm {
            state.changelist.push(Change::new(
                time,
                ChangeField::OwnerRealm,
                &entry.owner_realm,
                &listing.owner_realm,
            ));
        }
        if listing.owner != entry.owner {
            state.changelist.push(Change::new(
                time,
                ChangeField::Owner,
                &entry.owner,
                &listing.owner,
            ));
        }
        entry.owner = listing.owner.clone();
        entry.owner_realm = listing.owner_realm.clone();
        state.moved = true;
        tally.moves += 1;
        changed = true;
    }

    Ok(changed)
}

/// Classify a vanished listing.
///
/// Gone before its estimated deadline: bought out. Otherwise it ran out;
/// with a raised bid it was auctioned, untouched it expired.
fn close_entry(work: WorkEntry, time: DateTime<Utc>) -> ClosedRecord {
    let WorkEntry { entry, state } = work;
    let (result, profit) = if state.deadline < time {
        (ClosureResult::Bought, entry.buyout)
    } else if state.raised {
        (ClosureResult::Auctioned, state.last_bid)
    } else {
        (ClosureResult::Expired, 0)
    };

    let meta = ClosedListing {
        auc: entry.auc,
        opened: state.created,
        closed: time,
        seenlist: state.seenlist,
        changelist: state.changelist,
        result,
        profit,
    };
    ClosedRecord {
        listing: entry,
        meta,
    }
}
