//! Retention pruning: tombstone GC, size cap, orphan sweep.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Duration, Utc};
use driftsync_store::{RecordId, StoreError};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// What one prune pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Synced tombstones past retention, across all three tables.
    pub tombstones_reaped: usize,
    /// Active synced posts removed to honor the size cap.
    pub posts_capped: usize,
    /// Likes and comments whose parent post no longer exists.
    pub orphans_removed: usize,
}

impl PruneOutcome {
    /// Total records hard-deleted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.tombstones_reaped + self.posts_capped + self.orphans_removed
    }
}

impl SyncEngine {
    /// Runs one prune pass at the current wall clock, absorbing failures.
    pub fn prune(&self) {
        match self.prune_at(Utc::now()) {
            Ok(outcome) => info!(?outcome, "prune finished"),
            Err(SyncError::Store(StoreError::Closed)) => debug!("store closed, prune aborted"),
            Err(error) => warn!(%error, "prune aborted"),
        }
    }

    /// Runs one prune pass as of `now`, in a single transaction.
    ///
    /// Order matters: tombstone GC and the size cap run before the orphan
    /// sweep so that children of reaped posts are found and removed in the
    /// same pass. Only records the remote has acknowledged (`is_synced`)
    /// are ever hard-deleted by retention or the cap; an unsynced tombstone
    /// still owes the server its deletion.
    pub fn prune_at(&self, now: DateTime<Utc>) -> SyncResult<PruneOutcome> {
        let cutoff = now - Duration::days(self.config.retention_days);
        let max_posts = self.config.max_posts;

        let outcome = self.store.write(|txn| {
            let mut outcome = PruneOutcome::default();

            // Tombstone GC.
            for post in txn.posts() {
                if post.is_synced && post.deleted_at.is_some_and(|at| at < cutoff) {
                    txn.delete_post(post.id);
                    outcome.tombstones_reaped += 1;
                }
            }
            for like in txn.likes() {
                if like.is_synced && like.deleted_at.is_some_and(|at| at < cutoff) {
                    txn.delete_like(like.id);
                    outcome.tombstones_reaped += 1;
                }
            }
            for comment in txn.comments() {
                if comment.is_synced && comment.deleted_at.is_some_and(|at| at < cutoff) {
                    txn.delete_comment(comment.id);
                    outcome.tombstones_reaped += 1;
                }
            }

            // Size cap on active synced posts, oldest first.
            let mut active: Vec<_> = txn
                .posts()
                .into_iter()
                .filter(|post| post.deleted_at.is_none() && post.is_synced)
                .collect();
            if active.len() > max_posts {
                active.sort_by_key(|post| post.timestamp);
                let excess = active.len() - max_posts;
                for post in active.into_iter().take(excess) {
                    txn.delete_post(post.id);
                    outcome.posts_capped += 1;
                }
            }

            // Orphan sweep, against the post table as it now stands.
            let remaining: HashSet<RecordId> = txn.posts().iter().map(|post| post.id).collect();
            for like in txn.likes() {
                if !remaining.contains(&like.post_id) {
                    txn.delete_like(like.id);
                    outcome.orphans_removed += 1;
                }
            }
            for comment in txn.comments() {
                if !remaining.contains(&comment.post_id) {
                    txn.delete_comment(comment.id);
                    outcome.orphans_removed += 1;
                }
            }

            Ok(outcome)
        })?;

        self.stats.write().records_pruned += outcome.total() as u64;
        Ok(outcome)
    }
}
