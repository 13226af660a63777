//! Error types for race integration.
//!
//! Only a missing entry list is surfaced to callers as a failure. Every other
//! gap (absent fragment, unmatched horse number, unknown trainer) degrades to a
//! `None` block and never becomes an error value.

use thiserror::Error;

/// Result type for integration operations
pub type Result<T> = std::result::Result<T, IntegrateError>;

#[derive(Error, Debug)]
pub enum IntegrateError {
    /// Entry list fragment absent (or unreadable) for the requested race
    #[error("entry list missing for race {0}")]
    MissingRequiredSource(String),

    /// Fragment file exists but does not deserialize
    #[error("corrupt fragment {kind} for race {race_id}: {reason}")]
    CorruptFragment {
        race_id: String,
        kind: String,
        reason: String,
    },

    /// Race identifier is not a 12-digit token
    #[error("invalid race id: {0}")]
    InvalidRaceId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
