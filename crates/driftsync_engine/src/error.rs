//! Error types for the sync engine.

use driftsync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// These never escape the sync entry points (`push`, `pull`, `prune`,
/// `trigger_push`); they exist so the pipelines and the retry executor can
/// classify and log what went wrong.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Malformed request or response body.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server rejected the request.
    #[error("server error: {0}")]
    ServerError(String),

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Object bucket write failed.
    #[error("object storage error on {bucket}/{key}: {message}")]
    ObjectStorage {
        /// Target bucket.
        bucket: String,
        /// Target object key.
        key: String,
        /// Error message.
        message: String,
    },

    /// The local media file for an upload does not exist.
    #[error("media file missing: {uri}")]
    MediaMissing {
        /// The uri that did not resolve to a file.
        uri: String,
    },
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates an object storage error.
    pub fn object_storage(
        bucket: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ObjectStorage {
            bucket: bucket.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns true if retrying could plausibly succeed.
    ///
    /// The retry executor retries every error regardless (remote writes are
    /// idempotent upserts); this classification is for logging and for
    /// callers deciding whether a cycle is worth re-running at all.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::ServerError(_) => true,
            SyncError::ObjectStorage { .. } => true,
            SyncError::Protocol(_) => false,
            SyncError::Store(_) => false,
            SyncError::MediaMissing { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("bad certificate").is_retryable());
        assert!(SyncError::ServerError("500".into()).is_retryable());
        assert!(SyncError::object_storage("media", "a.jpg", "timeout").is_retryable());
        assert!(!SyncError::Protocol("bad json".into()).is_retryable());
        assert!(!SyncError::Store(StoreError::Closed).is_retryable());
    }

    #[test]
    fn store_error_converts() {
        let err: SyncError = StoreError::Closed.into();
        assert!(matches!(err, SyncError::Store(StoreError::Closed)));
    }
}
