//! Error types for snapshot input
//!
//! Everything here describes recoverable, input-level problems: a capture
//! that cannot be parsed or a realm string that cannot be encoded. Callers
//! skip the offending input and keep going.

use thiserror::Error;

/// Snapshot body errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("Snapshot body is not valid JSON: {0}")]
    Json(String),

    #[error("Snapshot body is malformed: {reason}")]
    Malformed { reason: String },
}

impl SnapshotError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        SnapshotError::Malformed {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        SnapshotError::Json(err.to_string())
    }
}

/// Identifier errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdError {
    #[error("Invalid realm {value:?}: expected \"region:slug\"")]
    InvalidRealm { value: String },
}
