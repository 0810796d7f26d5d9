//! Pull pipeline: watermarked download and merge.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use chrono::Utc;
use driftsync_protocol::{CommentRow, LikeRow, PostRow, WatermarkQuery};
use driftsync_store::{Comment, Like, Post, StoreError, WriteTxn};
use tracing::{debug, info, warn};

/// What one pull cycle accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullOutcome {
    /// Post rows merged (inserted or reconciled).
    pub posts_merged: usize,
    /// Like rows merged.
    pub likes_merged: usize,
    /// Comment rows merged.
    pub comments_merged: usize,
}

impl SyncEngine {
    /// Runs one pull cycle, absorbing all failures.
    ///
    /// The watermark advances only when the post-merge transaction commits;
    /// a failed cycle re-reads from the old watermark next time.
    pub fn pull(&self) {
        match self.try_pull() {
            Ok(outcome) => info!(?outcome, "pull cycle finished"),
            Err(SyncError::Store(StoreError::Closed)) => debug!("store closed, pull aborted"),
            Err(error) => warn!(%error, "pull cycle aborted"),
        }
    }

    /// Runs one pull cycle: posts (advancing the watermark), then likes and
    /// comments against the same watermark.
    pub fn try_pull(&self) -> SyncResult<PullOutcome> {
        let mut outcome = PullOutcome::default();
        let watermark = self.store.settings()?.last_sync_time;

        let post_query = WatermarkQuery::new(watermark, self.config.post_pull_limit);
        let Some(posts) = self
            .retry
            .execute("pull posts", || self.remote.posts_since(&post_query))
        else {
            return Ok(outcome);
        };

        let now = Utc::now();
        self.store.write(|txn| {
            for row in &posts {
                merge_post(txn, row)?;
            }
            txn.advance_watermark(now);
            Ok(())
        })?;
        outcome.posts_merged = posts.len();

        let child_query = WatermarkQuery::new(watermark, self.config.child_pull_limit);

        if let Some(likes) = self
            .retry
            .execute("pull likes", || self.remote.likes_since(&child_query))
        {
            self.store.write(|txn| {
                for row in &likes {
                    merge_like(txn, row);
                }
                Ok(())
            })?;
            outcome.likes_merged = likes.len();
        }

        if let Some(comments) = self.retry.execute("pull comments", || {
            self.remote.comments_since(&child_query)
        }) {
            self.store.write(|txn| {
                for row in &comments {
                    merge_comment(txn, row)?;
                }
                Ok(())
            })?;
            outcome.comments_merged = comments.len();
        }

        let merged = outcome.posts_merged + outcome.likes_merged + outcome.comments_merged;
        self.stats.write().records_pulled += merged as u64;

        Ok(outcome)
    }
}

/// Picks one scalar field's merged value.
///
/// With a merge base, a side only "wins" if it actually diverged from the
/// base; both-diverged falls back to last-write-wins. Without a base the
/// change history is unknown and the tiebreak decides alone.
fn merge_scalar<T: PartialEq + Clone>(
    local: &T,
    base: Option<&T>,
    remote: &T,
    remote_newer: bool,
) -> T {
    match base {
        Some(base) => {
            let local_changed = local != base;
            let remote_changed = remote != base;
            match (local_changed, remote_changed) {
                (false, true) => remote.clone(),
                (true, true) if remote_newer => remote.clone(),
                _ => local.clone(),
            }
        }
        None if remote_newer => remote.clone(),
        None => local.clone(),
    }
}

/// Merges one remote post row into the local store.
fn merge_post(txn: &mut WriteTxn<'_>, row: &PostRow) -> Result<(), StoreError> {
    match txn.get_post(row.id) {
        None => {
            let post = Post {
                id: row.id,
                text: row.text.clone(),
                timestamp: row.timestamp,
                media_kind: row.media_kind(),
                local_uri: None,
                remote_url: row.media_url().map(str::to_string),
                thumbnail_url: row.thumbnail_url.clone(),
                user_email: row.author().to_string(),
                is_synced: false,
                deleted_at: row.deleted_at,
                synced_text: None,
                synced_remote_url: None,
            };
            txn.put_post(post);
            txn.mark_post_synced(row.id)?;
        }
        Some(local) if local.is_synced => {
            let remote_newer = row.updated_at.is_some_and(|at| at > local.timestamp);
            if remote_newer {
                let mut post = local;
                post.text = row.text.clone();
                post.remote_url = row.media_url().map(str::to_string);
                post.timestamp = row.timestamp;
                post.deleted_at = row.deleted_at;
                txn.put_post(post);
                txn.mark_post_synced(row.id)?;
            }
        }
        Some(local) => {
            let remote_newer = row.updated_at.is_some_and(|at| at > local.timestamp);
            let has_base = local.synced_text.is_some();

            let mut post = local.clone();
            post.text = merge_scalar(
                &local.text,
                local.synced_text.as_ref(),
                &row.text,
                remote_newer,
            );
            let remote_media = row.media_url().map(str::to_string);
            post.remote_url = merge_scalar(
                &local.remote_url,
                has_base.then_some(&local.synced_remote_url),
                &remote_media,
                remote_newer,
            );
            txn.put_post(post);
            txn.mark_post_synced(row.id)?;
        }
    }
    Ok(())
}

/// Merges one remote like row. Likes have no conflict surface: absent rows
/// are inserted, a remote tombstone is adopted onto a synced local row, and
/// an unsynced local row (a pending toggle) wins until pushed.
fn merge_like(txn: &mut WriteTxn<'_>, row: &LikeRow) {
    match txn.get_like(row.id) {
        None => {
            let like = Like {
                id: row.id,
                post_id: row.post_id,
                user_email: row.user_email.clone(),
                is_synced: true,
                deleted_at: row.deleted_at,
            };
            txn.put_like(like);
        }
        Some(local) if local.is_synced => {
            if row.deleted_at.is_some() && local.deleted_at.is_none() {
                let mut like = local;
                like.deleted_at = row.deleted_at;
                txn.put_like(like);
            }
        }
        Some(_) => {}
    }
}

/// Merges one remote comment row: same shape as posts, with `text` as the
/// only merged field.
fn merge_comment(txn: &mut WriteTxn<'_>, row: &CommentRow) -> Result<(), StoreError> {
    match txn.get_comment(row.id) {
        None => {
            let comment = Comment {
                id: row.id,
                post_id: row.post_id,
                user_email: row.user_email.clone(),
                text: row.text.clone(),
                timestamp: row.created_at,
                is_synced: false,
                deleted_at: row.deleted_at,
                synced_text: None,
            };
            txn.put_comment(comment);
            txn.mark_comment_synced(row.id)?;
        }
        Some(local) if local.is_synced => {
            let remote_newer = row.updated_at.is_some_and(|at| at > local.timestamp);
            if remote_newer {
                let mut comment = local;
                comment.text = row.text.clone();
                comment.deleted_at = row.deleted_at;
                txn.put_comment(comment);
                txn.mark_comment_synced(row.id)?;
            }
        }
        Some(local) => {
            let remote_newer = row.updated_at.is_some_and(|at| at > local.timestamp);
            let mut comment = local.clone();
            comment.text = merge_scalar(
                &local.text,
                local.synced_text.as_ref(),
                &row.text,
                remote_newer,
            );
            txn.put_comment(comment);
            txn.mark_comment_synced(row.id)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, RetryPolicy};
    use crate::remote::MemoryRemote;
    use crate::storage::MemoryObjectStorage;
    use chrono::Duration as ChronoDuration;
    use driftsync_store::{LocalStore, MediaKind};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        engine: SyncEngine,
        remote: Arc<MemoryRemote>,
    }

    fn fixture() -> Fixture {
        let remote = Arc::new(MemoryRemote::new());
        let config = EngineConfig::new("/tmp/docs")
            .with_retry(RetryPolicy::new(1).with_base_delay(Duration::ZERO));
        let engine = SyncEngine::new(
            config,
            Arc::new(LocalStore::open_in_memory()),
            remote.clone(),
            Arc::new(MemoryObjectStorage::new()),
        );
        Fixture { engine, remote }
    }

    fn remote_post(text: &str) -> PostRow {
        let post = Post::new(text, MediaKind::Image, "remote@example.com", Utc::now());
        let mut row = PostRow::from_record(&post);
        row.image_url = Some("https://cdn/r.jpg".into());
        row.updated_at = Some(Utc::now());
        row
    }

    #[test]
    fn new_remote_post_is_inserted_synced() {
        let fx = fixture();
        fx.remote.seed_post(remote_post("from server"));

        let outcome = fx.engine.try_pull().unwrap();
        assert_eq!(outcome.posts_merged, 1);

        let posts = fx.engine.store().posts_where(|_| true).unwrap();
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert!(post.is_synced);
        assert_eq!(post.text, "from server");
        assert_eq!(post.remote_url.as_deref(), Some("https://cdn/r.jpg"));
        assert_eq!(post.user_email, "remote@example.com");
    }

    #[test]
    fn missing_wire_columns_default_on_insert() {
        let fx = fixture();
        let mut row = remote_post("bare");
        row.media_type = None;
        row.user_email = None;
        row.image_url = None;
        row.video_url = None;
        fx.remote.seed_post(row);

        fx.engine.try_pull().unwrap();

        let posts = fx.engine.store().posts_where(|_| true).unwrap();
        assert_eq!(posts[0].media_kind, MediaKind::Image);
        assert_eq!(posts[0].user_email, "anon");
        assert_eq!(posts[0].remote_url, None);
    }

    #[test]
    fn watermark_advances_and_filters_next_cycle() {
        let fx = fixture();
        fx.remote.seed_post(remote_post("first"));

        fx.engine.try_pull().unwrap();
        let after_first = fx.engine.store().settings().unwrap().last_sync_time;
        assert!(after_first.timestamp() > 0);

        // Nothing new: second pull merges nothing and never regresses.
        let outcome = fx.engine.try_pull().unwrap();
        assert_eq!(outcome.posts_merged, 0);
        let after_second = fx.engine.store().settings().unwrap().last_sync_time;
        assert!(after_second >= after_first);
    }

    #[test]
    fn failed_fetch_leaves_watermark_alone() {
        let fx = fixture();
        fx.remote.seed_post(remote_post("p"));
        // Two injected failures exhaust both attempts of this policy.
        fx.remote.fail_next_reads(2);

        let outcome = fx.engine.try_pull().unwrap();
        assert_eq!(outcome.posts_merged, 0);
        assert_eq!(
            fx.engine.store().settings().unwrap().last_sync_time.timestamp(),
            0
        );

        // Recovered remote: the old watermark still covers the row.
        let outcome = fx.engine.try_pull().unwrap();
        assert_eq!(outcome.posts_merged, 1);
    }

    #[test]
    fn synced_local_post_takes_newer_remote() {
        let fx = fixture();

        let mut local = Post::new(
            "old",
            MediaKind::Image,
            "a@example.com",
            Utc::now() - ChronoDuration::hours(2),
        );
        local.remote_url = Some("https://cdn/old.jpg".into());
        let id = local.id;
        fx.engine
            .store()
            .write(|txn| {
                txn.put_post(local);
                txn.mark_post_synced(id)
            })
            .unwrap();

        let mut row = remote_post("new");
        row.id = id;
        fx.remote.seed_post(row);

        fx.engine.try_pull().unwrap();
        let post = fx.engine.store().post(id).unwrap().unwrap();
        assert_eq!(post.text, "new");
        assert_eq!(post.remote_url.as_deref(), Some("https://cdn/r.jpg"));
        assert!(post.is_synced);
    }

    #[test]
    fn synced_local_post_ignores_stale_remote() {
        let fx = fixture();

        let local = Post::new("current", MediaKind::Image, "a@example.com", Utc::now());
        let id = local.id;
        fx.engine
            .store()
            .write(|txn| {
                txn.put_post(local);
                txn.mark_post_synced(id)
            })
            .unwrap();

        let mut row = remote_post("stale");
        row.id = id;
        row.timestamp = Utc::now() - ChronoDuration::hours(3);
        row.updated_at = Some(Utc::now() - ChronoDuration::hours(3));
        fx.remote.seed_post(row);

        fx.engine.try_pull().unwrap();
        assert_eq!(fx.engine.store().post(id).unwrap().unwrap().text, "current");
    }

    #[test]
    fn field_merge_combines_disjoint_changes() {
        let fx = fixture();

        // Synced at text="base", url=old.jpg; then the local side edits only
        // the text while the remote side changes only the image.
        let mut local = Post::new(
            "base",
            MediaKind::Image,
            "a@example.com",
            Utc::now() - ChronoDuration::hours(1),
        );
        local.remote_url = Some("https://cdn/old.jpg".into());
        let id = local.id;
        fx.engine
            .store()
            .write(|txn| {
                txn.put_post(local);
                txn.mark_post_synced(id)?;
                txn.set_post_text(id, "local edit")
            })
            .unwrap();

        let mut row = remote_post("base");
        row.id = id;
        row.image_url = Some("https://cdn/new.jpg".into());
        fx.remote.seed_post(row);

        fx.engine.try_pull().unwrap();

        let post = fx.engine.store().post(id).unwrap().unwrap();
        assert_eq!(post.text, "local edit", "local-only change kept");
        assert_eq!(
            post.remote_url.as_deref(),
            Some("https://cdn/new.jpg"),
            "remote-only change taken"
        );
        assert!(post.is_synced);
    }

    #[test]
    fn field_merge_both_changed_uses_last_write_wins() {
        let fx = fixture();

        let mut local = Post::new(
            "base",
            MediaKind::Image,
            "a@example.com",
            Utc::now() - ChronoDuration::hours(1),
        );
        local.remote_url = Some("https://cdn/old.jpg".into());
        let id = local.id;
        fx.engine
            .store()
            .write(|txn| {
                txn.put_post(local);
                txn.mark_post_synced(id)?;
                txn.set_post_text(id, "A")
            })
            .unwrap();

        // Remote changed the same field, with a newer updated_at.
        let mut row = remote_post("B");
        row.id = id;
        row.image_url = Some("https://cdn/old.jpg".into());
        fx.remote.seed_post(row);

        fx.engine.try_pull().unwrap();
        let post = fx.engine.store().post(id).unwrap().unwrap();
        assert_eq!(post.text, "B", "newer remote wins the contested field");
        assert!(post.is_synced);
    }

    #[test]
    fn pulled_likes_insert_if_absent_and_respect_pending_toggle() {
        let fx = fixture();

        // A post both sides know about.
        let post = Post::new("p", MediaKind::Image, "a@example.com", Utc::now());
        let post_id = post.id;
        fx.engine
            .store()
            .write(|txn| {
                txn.put_post(post);
                txn.mark_post_synced(post_id)
            })
            .unwrap();

        // Absent like arrives from the server.
        let mut incoming = LikeRow {
            id: driftsync_store::RecordId::new(),
            post_id,
            user_email: "remote@example.com".into(),
            deleted_at: None,
            updated_at: Some(Utc::now()),
        };
        fx.remote.seed_like(incoming.clone());

        // A local unsynced like (pending toggle) that the server claims is
        // deleted: local wins until pushed.
        let pending = Like::new(post_id, "a@example.com");
        let pending_id = pending.id;
        fx.engine
            .store()
            .write(|txn| {
                txn.put_like(pending);
                Ok(())
            })
            .unwrap();
        incoming.id = pending_id;
        incoming.deleted_at = Some(Utc::now());
        fx.remote.seed_like(incoming);

        fx.engine.try_pull().unwrap();

        let local_pending = fx.engine.store().like(pending_id).unwrap().unwrap();
        assert!(local_pending.deleted_at.is_none(), "pending toggle kept");
        assert!(!local_pending.is_synced);

        let likes = fx.engine.store().likes_where(|_| true).unwrap();
        assert_eq!(likes.len(), 2);
    }

    #[test]
    fn remote_comment_edit_merges_by_field() {
        let fx = fixture();
        let post_id = driftsync_store::RecordId::new();

        let comment = Comment::new(
            post_id,
            "a@example.com",
            "base",
            Utc::now() - ChronoDuration::hours(1),
        );
        let id = comment.id;
        fx.engine
            .store()
            .write(|txn| {
                txn.put_comment(comment);
                txn.mark_comment_synced(id)
            })
            .unwrap();

        let row = CommentRow {
            id,
            post_id,
            user_email: "a@example.com".into(),
            text: "server edit".into(),
            created_at: Utc::now() - ChronoDuration::hours(1),
            deleted_at: None,
            updated_at: Some(Utc::now()),
        };
        fx.remote.seed_comment(row);

        fx.engine.try_pull().unwrap();
        assert_eq!(
            fx.engine.store().comment(id).unwrap().unwrap().text,
            "server edit"
        );
    }
}
