//! Snapshot body parsing and validation
//!
//! A capture body is a JSON document with a realm list and an auction
//! list. A body whose realm list is missing or empty, or whose auction list
//! is missing, is rejected here before it can reach the ledger. An empty
//! auction list is valid: it means every open listing has closed.

use crate::errors::SnapshotError;
use crate::listing::Listing;
use serde::{Deserialize, Serialize};

/// Realm descriptor from the capture header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmInfo {
    pub name: String,
    pub slug: String,
}

/// Capture body exactly as it comes off the wire.
#[derive(Debug, Clone, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    realms: Option<Vec<RealmInfo>>,
    #[serde(default)]
    auctions: Option<Vec<Listing>>,
}

/// A validated capture: at least one realm and a (possibly empty) auction list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub realms: Vec<RealmInfo>,
    pub auctions: Vec<Listing>,
}

impl Snapshot {
    /// Parse and validate a capture body.
    pub fn parse(data: &[u8]) -> Result<Self, SnapshotError> {
        let raw: RawSnapshot = serde_json::from_slice(data)?;

        let realms = match raw.realms {
            None => return Err(SnapshotError::malformed("realm list is missing")),
            Some(realms) if realms.is_empty() => {
                return Err(SnapshotError::malformed("realm list is empty"))
            }
            Some(realms) => realms,
        };
        let auctions = raw
            .auctions
            .ok_or_else(|| SnapshotError::malformed("auction list is missing"))?;

        Ok(Self { realms, auctions })
    }
}
