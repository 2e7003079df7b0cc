//! Auction Ledger Service
//!
//! Replays periodic full captures of an auction house into an incremental
//! ledger: listings are opened when first seen, diffed while they stay
//! listed and closed exactly once when they disappear, with the closure
//! classified as bought out, auctioned or expired.
//!
//! # Modules
//! - `naming`: snapshot identifier codec and output file naming
//! - `source`: directory, archive and composite snapshot sources
//! - `deadline`: expiry estimation from the remaining-time category
//! - `ledger`: the per-realm snapshot state machine
//! - `state`: durable ledger state with integrity and compression
//! - `output`: append-only result streams
//! - `runner`: batch replay of a source into a ledger
//! - `config`: TOML configuration

pub mod naming;
pub mod source;
pub mod deadline;
pub mod ledger;
pub mod state;
pub mod output;
pub mod runner;
pub mod config;
