//! The sync engine.

use crate::config::EngineConfig;
use crate::remote::RemoteStore;
use crate::resolver::MediaPathResolver;
use crate::retry::RetryExecutor;
use crate::storage::ObjectStorage;
use crate::uploader::MediaUploader;
use driftsync_store::LocalStore;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

/// Counters accumulated across sync cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Completed push cycles.
    pub push_cycles: u64,
    /// Posts acknowledged by the remote.
    pub posts_pushed: u64,
    /// Posts left for a later cycle (media missing or upsert exhausted).
    pub posts_skipped: u64,
    /// Likes acknowledged by the remote.
    pub likes_pushed: u64,
    /// Comments acknowledged by the remote.
    pub comments_pushed: u64,
    /// Records created or merged by pull.
    pub records_pulled: u64,
    /// Records hard-deleted by the pruner.
    pub records_pruned: u64,
}

/// Orchestrates replication between the local store and the remote.
///
/// One engine value owns the process-wide scheduling state (`is_syncing`,
/// `last_push_time`); constructing a second engine over the same store is
/// outside the contract. All entry points absorb their failures — see the
/// crate docs.
pub struct SyncEngine {
    pub(crate) config: EngineConfig,
    pub(crate) store: Arc<LocalStore>,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) storage: Arc<dyn ObjectStorage>,
    pub(crate) resolver: MediaPathResolver,
    pub(crate) retry: RetryExecutor,
    pub(crate) is_syncing: AtomicBool,
    pub(crate) last_push_time: Mutex<Option<Instant>>,
    pub(crate) stats: RwLock<SyncStats>,
}

impl SyncEngine {
    /// Creates an engine over the given store, remote and object storage.
    pub fn new(
        config: EngineConfig,
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        let resolver = MediaPathResolver::new(&config.documents_dir);
        let retry = RetryExecutor::new(config.retry.clone());
        Self {
            config,
            store,
            remote,
            storage,
            resolver,
            retry,
            is_syncing: AtomicBool::new(false),
            last_push_time: Mutex::new(None),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// The local store this engine replicates.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// The configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A snapshot of the accumulated counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    pub(crate) fn uploader(&self) -> MediaUploader<'_> {
        MediaUploader::new(&self.resolver, self.storage.as_ref(), &self.retry)
    }
}
