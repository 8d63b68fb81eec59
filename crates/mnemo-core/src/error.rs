//! Error taxonomy for the memory core

use crate::types::ResultState;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors surfaced by the store, engine, and manager.
///
/// Running out of compression candidates while still over budget is not
/// an error; it is reported through `CompressionReport::over_budget`.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Unknown id referenced by compress/expand/get.
    #[error("{0} not found")]
    NotFound(String),

    /// Id collision on record; ids are never reused.
    #[error("duplicate id {0}")]
    DuplicateId(String),

    /// An id string that is not of the dashboard-visible form.
    #[error("malformed id {0:?} (expected TR-<n> or G-<n>)")]
    MalformedId(String),

    /// State machine violation.
    #[error("invalid transition for {id}: {} -> {}", from.as_str(), to.as_str())]
    InvalidTransition {
        id: String,
        from: ResultState,
        to: ResultState,
    },

    /// Compression would not reduce the rendered size.
    #[error("compression would not reduce size ({combined} >= {full} tokens)")]
    NoGain { combined: usize, full: usize },

    /// The summarization collaborator failed and no fallback applied.
    #[error("summarization failed: {0}")]
    Summarization(String),

    /// The persistence collaborator is unreachable.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}
