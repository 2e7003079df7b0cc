//! Change and closure records
//!
//! These are the ledger's outputs: one `Change` per field-level change seen
//! between two consecutive observations of a listing, and one
//! `ClosedListing` per listing when it disappears.

use crate::ids::ListingId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tracked listing field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeField {
    Bid,
    #[serde(rename = "timeleft")]
    TimeLeft,
    /// Synthetic: re-estimated expiry after a category change
    Deadline,
    Owner,
    OwnerRealm,
}

impl ChangeField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeField::Bid => "bid",
            ChangeField::TimeLeft => "timeleft",
            ChangeField::Deadline => "deadline",
            ChangeField::Owner => "owner",
            ChangeField::OwnerRealm => "owner_realm",
        }
    }
}

impl fmt::Display for ChangeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed change of one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub time: DateTime<Utc>,
    pub field: ChangeField,
    pub from: String,
    pub to: String,
}

impl Change {
    pub fn new(
        time: DateTime<Utc>,
        field: ChangeField,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self {
            time,
            field,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Inferred outcome of a closed listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosureResult {
    /// Vanished before its estimated deadline: instant buyout
    Bought,
    /// Reached its deadline after at least one bid raise
    Auctioned,
    /// Reached its deadline untouched
    Expired,
}

impl ClosureResult {
    /// Bought and auctioned listings count as sales.
    pub fn is_success(&self) -> bool {
        matches!(self, ClosureResult::Bought | ClosureResult::Auctioned)
    }
}

impl fmt::Display for ClosureResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosureResult::Bought => f.write_str("bought"),
            ClosureResult::Auctioned => f.write_str("auctioned"),
            ClosureResult::Expired => f.write_str("expired"),
        }
    }
}

/// Closure metadata emitted exactly once per listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedListing {
    pub auc: ListingId,
    pub opened: DateTime<Utc>,
    pub closed: DateTime<Utc>,
    pub seenlist: Vec<DateTime<Utc>>,
    pub changelist: Vec<Change>,
    pub result: ClosureResult,
    /// Buyout for bought, last bid for auctioned, 0 for expired
    pub profit: i64,
}
