//! Listing observation types
//!
//! One `Listing` is one entry of a capture's auction list: what the
//! marketplace reported about a single open listing at capture time.
//! Variant payload (pet fields, modifiers, bonus lists) is carried through
//! untouched; the ledger never looks at it.

use crate::ids::ListingId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse remaining-time category reported instead of an exact expiry.
///
/// The marketplace only ever reports the four known buckets. Anything else
/// is kept verbatim as `Unrecognized` so that the ledger, not the parser,
/// decides how to fail on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TimeLeft {
    /// Under 30 minutes
    Short,
    /// 30 minutes to 2 hours
    Medium,
    /// 2 to 12 hours
    Long,
    /// 12 to 48 hours
    VeryLong,
    /// A category outside the fixed set
    Unrecognized(String),
}

impl TimeLeft {
    /// The known categories, shortest first.
    pub const KNOWN: [TimeLeft; 4] = [
        TimeLeft::Short,
        TimeLeft::Medium,
        TimeLeft::Long,
        TimeLeft::VeryLong,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            TimeLeft::Short => "SHORT",
            TimeLeft::Medium => "MEDIUM",
            TimeLeft::Long => "LONG",
            TimeLeft::VeryLong => "VERY_LONG",
            TimeLeft::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for TimeLeft {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "SHORT" => TimeLeft::Short,
            "MEDIUM" => TimeLeft::Medium,
            "LONG" => TimeLeft::Long,
            "VERY_LONG" => TimeLeft::VeryLong,
            _ => TimeLeft::Unrecognized(raw),
        }
    }
}

impl From<&str> for TimeLeft {
    fn from(raw: &str) -> Self {
        TimeLeft::from(raw.to_string())
    }
}

impl From<TimeLeft> for String {
    fn from(time_left: TimeLeft) -> Self {
        match time_left {
            TimeLeft::Unrecognized(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TimeLeft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item modifier attached to a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    #[serde(rename = "type")]
    pub kind: u32,
    pub value: i64,
}

/// Bonus list reference attached to a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusList {
    pub bonus_list_id: u32,
}

/// Which optional payload a listing carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingVariant {
    Base,
    WithBonus,
    WithModifiers,
    Pet,
}

/// A single listing as observed in one capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub auc: ListingId,
    #[serde(default)]
    pub item: u64,
    pub owner: String,
    pub owner_realm: String,
    pub bid: i64,
    pub buyout: i64,
    #[serde(default)]
    pub quantity: u32,
    pub time_left: TimeLeft,
    #[serde(default)]
    pub rand: i64,
    #[serde(default)]
    pub seed: i64,
    #[serde(default)]
    pub context: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<Vec<Modifier>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus_lists: Option<Vec<BonusList>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_species_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_breed_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_quality_id: Option<u32>,
}

impl Listing {
    /// Create a plain listing with no variant payload.
    pub fn new(
        auc: impl Into<ListingId>,
        owner: impl Into<String>,
        owner_realm: impl Into<String>,
        bid: i64,
        buyout: i64,
        time_left: TimeLeft,
    ) -> Self {
        Self {
            auc: auc.into(),
            item: 0,
            owner: owner.into(),
            owner_realm: owner_realm.into(),
            bid,
            buyout,
            quantity: 1,
            time_left,
            rand: 0,
            seed: 0,
            context: 0,
            modifiers: None,
            bonus_lists: None,
            pet_species_id: None,
            pet_breed_id: None,
            pet_level: None,
            pet_quality_id: None,
        }
    }

    /// Classify by payload: a pet species wins over modifiers, which win
    /// over bonus lists.
    pub fn variant(&self) -> ListingVariant {
        if self.pet_species_id.unwrap_or(0) != 0 {
            ListingVariant::Pet
        } else if self.modifiers.is_some() {
            ListingVariant::WithModifiers
        } else if self.bonus_lists.is_some() {
            ListingVariant::WithBonus
        } else {
            ListingVariant::Base
        }
    }

    /// Copy of the listing carrying only the payload its variant owns.
    ///
    /// Pet listings keep modifiers and pet fields, modded listings keep
    /// modifiers and bonus lists, bonus listings keep bonus lists.
    pub fn detail(&self) -> Listing {
        let mut detail = self.clone();
        match self.variant() {
            ListingVariant::Pet => {
                detail.bonus_lists = None;
            }
            ListingVariant::WithModifiers => {
                detail.clear_pet();
            }
            ListingVariant::WithBonus => {
                detail.modifiers = None;
                detail.clear_pet();
            }
            ListingVariant::Base => {
                detail.modifiers = None;
                detail.bonus_lists = None;
                detail.clear_pet();
            }
        }
        detail
    }

    fn clear_pet(&mut self) {
        self.pet_species_id = None;
        self.pet_breed_id = None;
        self.pet_level = None;
        self.pet_quality_id = None;
    }
}
