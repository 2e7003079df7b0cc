//! Identifier types for auction house entities
//!
//! A `ListingId` is the marketplace's own 64-bit auction number, stable for
//! the whole life of a listing. A `Realm` names one auction house as
//! `region:slug` (e.g. `eu:fordragon`) and knows how to render itself into
//! a filesystem-safe form and back.

use crate::errors::IdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marketplace listing identifier
///
/// Stable across snapshots for the same listing; the ledger keys its
/// working set by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(i64);

impl ListingId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ListingId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Realm identifier
///
/// Format: "region:slug" (e.g., "eu:fordragon", "us:twisting-nether").
/// The region never contains `-` or `:`, the slug never contains `:`, so
/// the safe form `region-slug` decodes back unambiguously.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Realm {
    region: String,
    slug: String,
}

impl Realm {
    /// Build a realm from its two parts, validating both.
    pub fn new(region: &str, slug: &str) -> Result<Self, IdError> {
        let valid_region =
            !region.is_empty() && !region.contains('-') && !region.contains(':');
        let valid_slug = !slug.is_empty() && !slug.contains(':') && !slug.contains('/');
        if !valid_region || !valid_slug {
            return Err(IdError::InvalidRealm {
                value: format!("{}:{}", region, slug),
            });
        }
        Ok(Self {
            region: region.to_string(),
            slug: slug.to_string(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Filesystem-safe rendering: `eu:fordragon` -> `eu-fordragon`.
    pub fn safe_name(&self) -> String {
        format!("{}-{}", self.region, self.slug)
    }

    /// Inverse of [`Realm::safe_name`]; the first `-` separates the region.
    pub fn from_safe_name(safe: &str) -> Result<Self, IdError> {
        match safe.split_once('-') {
            Some((region, slug)) => Self::new(region, slug),
            None => Err(IdError::InvalidRealm {
                value: safe.to_string(),
            }),
        }
    }
}

impl FromStr for Realm {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((region, slug)) => Self::new(region, slug),
            None => Err(IdError::InvalidRealm {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Realm {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Realm> for String {
    fn from(realm: Realm) -> Self {
        realm.to_string()
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.region, self.slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_realm_parse() {
        let realm: Realm = "eu:fordragon".parse().unwrap();
        assert_eq!(realm.region(), "eu");
        assert_eq!(realm.slug(), "fordragon");
        assert_eq!(realm.to_string(), "eu:fordragon");
    }

    #[test]
    fn test_realm_safe_name_with_dashed_slug() {
        let realm: Realm = "us:twisting-nether".parse().unwrap();
        assert_eq!(realm.safe_name(), "us-twisting-nether");
        assert_eq!(Realm::from_safe_name("us-twisting-nether").unwrap(), realm);
    }

    #[test]
    fn test_realm_rejects_missing_region() {
        assert!("fordragon".parse::<Realm>().is_err());
        assert!(":fordragon".parse::<Realm>().is_err());
        assert!("eu:".parse::<Realm>().is_err());
        assert!("e-u:fordragon".parse::<Realm>().is_err());
    }

    #[test]
    fn test_realm_serde_as_string() {
        let realm: Realm = "eu:fordragon".parse().unwrap();
        let json = serde_json::to_string(&realm).unwrap();
        assert_eq!(json, "\"eu:fordragon\"");
        let back: Realm = serde_json::from_str(&json).unwrap();
        assert_eq!(back, realm);
    }

    #[test]
    fn test_listing_id_ordering() {
        assert!(ListingId::new(1) < ListingId::new(2));
        assert_eq!(ListingId::from(42).to_string(), "42");
    }

    proptest! {
        #[test]
        fn prop_safe_name_is_lossless(
            region in "[a-z]{2,4}",
            slug in "[a-z][a-z-]{0,20}",
        ) {
            let realm = Realm::new(&region, &slug).unwrap();
            prop_assert_eq!(Realm::from_safe_name(&realm.safe_name()).unwrap(), realm);
        }
    }
}
