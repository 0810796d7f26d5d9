//! Error types for the local store.

use crate::change_feed::EntityKind;
use crate::id::RecordId;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in local store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store has been closed; every entry point short-circuits.
    #[error("store is closed")]
    Closed,

    /// A record referenced inside a transaction does not exist.
    #[error("record not found: {id} in {kind:?}")]
    NotFound {
        /// Entity table that was searched.
        kind: EntityKind,
        /// The id that did not resolve.
        id: RecordId,
    },

    /// A transaction callback bailed out; no staged write was applied.
    #[error("transaction aborted: {reason}")]
    Aborted {
        /// Reason for the abort.
        reason: String,
    },
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(kind: EntityKind, id: RecordId) -> Self {
        Self::NotFound { kind, id }
    }

    /// Creates a transaction-aborted error.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }
}
