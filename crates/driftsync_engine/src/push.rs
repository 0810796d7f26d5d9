//! Push pipeline: dependency-ordered upload of unsynced records.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use driftsync_protocol::{CommentRow, LikeRow, PostRow};
use driftsync_store::StoreError;
use tracing::{debug, info, warn};

/// What one push cycle accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Posts acknowledged by the remote.
    pub posts_pushed: usize,
    /// Posts left unsynced this cycle (media missing or upsert exhausted).
    pub posts_skipped: usize,
    /// Likes acknowledged by the remote.
    pub likes_pushed: usize,
    /// Likes deferred because their parent post is not synced yet.
    pub likes_deferred: usize,
    /// Comments acknowledged by the remote.
    pub comments_pushed: usize,
    /// Comments deferred because their parent post is not synced yet.
    pub comments_deferred: usize,
}

impl PushOutcome {
    /// True when nothing was skipped or deferred.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.posts_skipped == 0 && self.likes_deferred == 0 && self.comments_deferred == 0
    }
}

impl SyncEngine {
    /// Runs one push cycle, absorbing all failures.
    ///
    /// Anything that could not be pushed stays unsynced and is retried on a
    /// later cycle; a closed store aborts silently.
    pub fn push(&self) {
        match self.try_push() {
            Ok(outcome) => info!(?outcome, "push cycle finished"),
            Err(SyncError::Store(StoreError::Closed)) => debug!("store closed, push aborted"),
            Err(error) => warn!(%error, "push cycle aborted"),
        }
    }

    /// Runs one push cycle: posts, then eligible likes, then eligible
    /// comments. Returns the outcome; errs only on local store failures.
    pub fn try_push(&self) -> SyncResult<PushOutcome> {
        let mut outcome = PushOutcome::default();
        self.push_posts(&mut outcome)?;
        self.push_likes(&mut outcome)?;
        self.push_comments(&mut outcome)?;

        let mut stats = self.stats.write();
        stats.push_cycles += 1;
        stats.posts_pushed += outcome.posts_pushed as u64;
        stats.posts_skipped += outcome.posts_skipped as u64;
        stats.likes_pushed += outcome.likes_pushed as u64;
        stats.comments_pushed += outcome.comments_pushed as u64;

        Ok(outcome)
    }

    /// Pushes unsynced posts one at a time, each standing on its own
    /// idempotent upsert. A failed media upload or exhausted metadata
    /// upsert skips just that post.
    fn push_posts(&self, outcome: &mut PushOutcome) -> SyncResult<()> {
        let pending = self.store.unsynced_posts()?;
        if pending.is_empty() {
            return Ok(());
        }
        debug!(count = pending.len(), "pushing posts");

        let uploader = self.uploader();
        for mut post in pending {
            if post.needs_media_upload() {
                let uploaded = post
                    .local_uri
                    .as_deref()
                    .and_then(|uri| uploader.upload(uri, post.id, post.media_kind));

                match uploaded {
                    Some(url) => {
                        self.store.write(|txn| {
                            if txn.get_post(post.id).is_some() {
                                txn.set_post_remote_url(post.id, &url)?;
                            }
                            Ok(())
                        })?;
                        post.remote_url = Some(url);
                    }
                    None => {
                        warn!(post = %post.id, "media not uploaded, skipping post this cycle");
                        outcome.posts_skipped += 1;
                        continue;
                    }
                }
            }

            let row = PostRow::from_record(&post);
            let acked = self
                .retry
                .execute("post upsert", || self.remote.upsert_post(&row))
                .is_some();

            if acked {
                self.store.write(|txn| {
                    if txn.get_post(post.id).is_some() {
                        txn.mark_post_synced(post.id)?;
                    }
                    Ok(())
                })?;
                outcome.posts_pushed += 1;
            } else {
                outcome.posts_skipped += 1;
            }
        }
        Ok(())
    }

    /// Pushes eligible unsynced likes as two batches: tombstoned rows first,
    /// then active rows. A failed batch aborts the likes phase for this
    /// cycle; comments still run.
    fn push_likes(&self, outcome: &mut PushOutcome) -> SyncResult<()> {
        let pending = self.store.unsynced_likes()?;
        if pending.is_empty() {
            return Ok(());
        }

        let mut eligible = Vec::new();
        for like in pending {
            match self.store.post(like.post_id)? {
                Some(parent) if parent.is_synced => eligible.push(like),
                Some(_) => {
                    debug!(like = %like.id, "parent post unsynced, deferring like");
                    outcome.likes_deferred += 1;
                }
                None => {
                    warn!(like = %like.id, "parent post missing locally, deferring like");
                    outcome.likes_deferred += 1;
                }
            }
        }

        let (to_delete, to_insert): (Vec<_>, Vec<_>) =
            eligible.into_iter().partition(|like| like.is_tombstoned());

        for batch in [to_delete, to_insert] {
            if batch.is_empty() {
                continue;
            }
            let rows: Vec<LikeRow> = batch.iter().map(LikeRow::from_record).collect();
            let acked = self
                .retry
                .execute("likes batch upsert", || self.remote.upsert_likes(&rows))
                .is_some();
            if !acked {
                warn!(count = batch.len(), "likes batch failed, aborting likes phase");
                return Ok(());
            }

            self.store.write(|txn| {
                for like in &batch {
                    if txn.get_like(like.id).is_some() {
                        txn.mark_like_synced(like.id)?;
                    }
                }
                Ok(())
            })?;
            outcome.likes_pushed += batch.len();
        }
        Ok(())
    }

    /// Same shape as the likes phase, against the comments table.
    fn push_comments(&self, outcome: &mut PushOutcome) -> SyncResult<()> {
        let pending = self.store.unsynced_comments()?;
        if pending.is_empty() {
            return Ok(());
        }

        let mut eligible = Vec::new();
        for comment in pending {
            match self.store.post(comment.post_id)? {
                Some(parent) if parent.is_synced => eligible.push(comment),
                Some(_) => {
                    debug!(comment = %comment.id, "parent post unsynced, deferring comment");
                    outcome.comments_deferred += 1;
                }
                None => {
                    warn!(comment = %comment.id, "parent post missing locally, deferring comment");
                    outcome.comments_deferred += 1;
                }
            }
        }

        let (to_delete, to_insert): (Vec<_>, Vec<_>) = eligible
            .into_iter()
            .partition(|comment| comment.is_tombstoned());

        for batch in [to_delete, to_insert] {
            if batch.is_empty() {
                continue;
            }
            let rows: Vec<CommentRow> = batch.iter().map(CommentRow::from_record).collect();
            let acked = self
                .retry
                .execute("comments batch upsert", || {
                    self.remote.upsert_comments(&rows)
                })
                .is_some();
            if !acked {
                warn!(count = batch.len(), "comments batch failed, aborting comments phase");
                return Ok(());
            }

            self.store.write(|txn| {
                for comment in &batch {
                    if txn.get_comment(comment.id).is_some() {
                        txn.mark_comment_synced(comment.id)?;
                    }
                }
                Ok(())
            })?;
            outcome.comments_pushed += batch.len();
        }
        Ok(())
    }
}
