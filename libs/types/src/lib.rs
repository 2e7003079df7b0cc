//! Types library for the auction house ledger
//!
//! This library provides the core type definitions shared by every consumer
//! of auction house snapshots: the capture body as it arrives from the
//! marketplace API, the listing observations inside it, and the records the
//! ledger emits when a listing closes.
//!
//! # Version
//! v1.0.0
//!
//! # Modules
//! - `ids`: Identifiers (ListingId, Realm)
//! - `listing`: Listing observations and the remaining-time category
//! - `snapshot`: Snapshot body parsing and validation
//! - `closure`: Change records and closed-listing records
//! - `errors`: Error taxonomy for malformed input

// Public modules
pub mod ids;
pub mod listing;
pub mod snapshot;
pub mod closure;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::listing::*;
    pub use crate::snapshot::*;
    pub use crate::closure::*;
    pub use crate::errors::*;
}
