//! Store error model.

use thiserror::Error;

/// Result type used by the store traits.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error.
///
/// Deterministic business failures (duplicate login) surface as `Conflict`;
/// everything infrastructural collapses into `Storage`. Callers never retry.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A uniqueness guarantee was violated (e.g. login already taken).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other storage failure (connection loss, malformed row, pool
    /// shutdown).
    #[error("storage error: {0}")]
    Storage(String),
}
