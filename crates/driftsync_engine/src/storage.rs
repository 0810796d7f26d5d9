//! Object bucket abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// An object bucket store (images in `media`, videos in `reels`).
///
/// Implementations must give `put` upsert semantics: re-writing an existing
/// key overwrites any partial prior upload without error, which is what
/// makes retried uploads safe.
pub trait ObjectStorage: Send + Sync {
    /// Writes an object, replacing any existing one under the same key.
    fn put(&self, bucket: &str, key: &str, content_type: &str, bytes: &[u8]) -> SyncResult<()>;

    /// Returns the public URL of an object. Deterministic in bucket and
    /// key; no probe is performed.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// In-memory object storage for tests.
#[derive(Debug, Default)]
pub struct MemoryObjectStorage {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    fail_puts: AtomicU32,
}

impl MemoryObjectStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` puts fail with a retryable error.
    pub fn fail_next_puts(&self, n: u32) {
        self.fail_puts.store(n, Ordering::SeqCst);
    }

    /// Returns the stored bytes of an object, if present.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStorage for MemoryObjectStorage {
    fn put(&self, bucket: &str, key: &str, _content_type: &str, bytes: &[u8]) -> SyncResult<()> {
        let remaining = self.fail_puts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_puts.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncError::object_storage(bucket, key, "injected failure"));
        }

        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("https://objects.test/{bucket}/{key}")
    }
}
