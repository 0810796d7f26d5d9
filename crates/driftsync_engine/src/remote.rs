//! Remote relational store abstraction.

use crate::error::{SyncError, SyncResult};
use chrono::Utc;
use driftsync_protocol::{CommentRow, LikeRow, PostRow, WatermarkQuery};
use driftsync_store::RecordId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// The remote relational store behind the sync engine.
///
/// Every write is an upsert keyed on the record id, so repeating a call is
/// idempotent — a primary-key collision is indistinguishable from success.
/// Selects are watermarked: posts by authored `timestamp` (newest first),
/// likes and comments by the server-maintained `updated_at`.
pub trait RemoteStore: Send + Sync {
    /// Upserts a single post row.
    fn upsert_post(&self, row: &PostRow) -> SyncResult<()>;

    /// Upserts a batch of like rows in one call.
    fn upsert_likes(&self, rows: &[LikeRow]) -> SyncResult<()>;

    /// Upserts a batch of comment rows in one call.
    fn upsert_comments(&self, rows: &[CommentRow]) -> SyncResult<()>;

    /// Posts with `timestamp > query.after`, newest first, capped at
    /// `query.limit`.
    fn posts_since(&self, query: &WatermarkQuery) -> SyncResult<Vec<PostRow>>;

    /// Likes with `updated_at > query.after`, capped at `query.limit`.
    fn likes_since(&self, query: &WatermarkQuery) -> SyncResult<Vec<LikeRow>>;

    /// Comments with `updated_at > query.after`, capped at `query.limit`.
    fn comments_since(&self, query: &WatermarkQuery) -> SyncResult<Vec<CommentRow>>;
}

/// In-memory remote store for tests: real upsert-and-select semantics,
/// server-stamped `updated_at`, and scriptable failure injection.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    posts: RwLock<HashMap<RecordId, PostRow>>,
    likes: RwLock<HashMap<RecordId, LikeRow>>,
    comments: RwLock<HashMap<RecordId, CommentRow>>,
    fail_writes: AtomicU32,
    fail_reads: AtomicU32,
}

impl MemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` write calls fail with a retryable transport error.
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` read calls fail with a retryable transport error.
    pub fn fail_next_reads(&self, n: u32) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }

    fn take_write_failure(&self) -> SyncResult<()> {
        let remaining = self.fail_writes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_writes.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncError::transport_retryable("injected write failure"));
        }
        Ok(())
    }

    fn take_read_failure(&self) -> SyncResult<()> {
        let remaining = self.fail_reads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_reads.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncError::transport_retryable("injected read failure"));
        }
        Ok(())
    }

    /// Seeds a post row verbatim, preserving any `updated_at` it carries.
    /// This simulates another client having written to the server earlier.
    pub fn seed_post(&self, row: PostRow) {
        self.posts.write().insert(row.id, row);
    }

    /// Seeds a like row verbatim.
    pub fn seed_like(&self, row: LikeRow) {
        self.likes.write().insert(row.id, row);
    }

    /// Seeds a comment row verbatim.
    pub fn seed_comment(&self, row: CommentRow) {
        self.comments.write().insert(row.id, row);
    }

    /// Returns a post row by id.
    pub fn post(&self, id: RecordId) -> Option<PostRow> {
        self.posts.read().get(&id).cloned()
    }

    /// Returns a like row by id.
    pub fn like(&self, id: RecordId) -> Option<LikeRow> {
        self.likes.read().get(&id).cloned()
    }

    /// Returns a comment row by id.
    pub fn comment(&self, id: RecordId) -> Option<CommentRow> {
        self.comments.read().get(&id).cloned()
    }

    /// Number of post rows.
    pub fn post_count(&self) -> usize {
        self.posts.read().len()
    }

    /// Number of like rows.
    pub fn like_count(&self) -> usize {
        self.likes.read().len()
    }

    /// Number of comment rows.
    pub fn comment_count(&self) -> usize {
        self.comments.read().len()
    }
}

impl RemoteStore for MemoryRemote {
    fn upsert_post(&self, row: &PostRow) -> SyncResult<()> {
        self.take_write_failure()?;
        let mut row = row.clone();
        row.updated_at = Some(Utc::now());
        self.posts.write().insert(row.id, row);
        Ok(())
    }

    fn upsert_likes(&self, rows: &[LikeRow]) -> SyncResult<()> {
        self.take_write_failure()?;
        let mut likes = self.likes.write();
        for row in rows {
            let mut row = row.clone();
            row.updated_at = Some(Utc::now());
            likes.insert(row.id, row);
        }
        Ok(())
    }

    fn upsert_comments(&self, rows: &[CommentRow]) -> SyncResult<()> {
        self.take_write_failure()?;
        let mut comments = self.comments.write();
        for row in rows {
            let mut row = row.clone();
            row.updated_at = Some(Utc::now());
            comments.insert(row.id, row);
        }
        Ok(())
    }

    fn posts_since(&self, query: &WatermarkQuery) -> SyncResult<Vec<PostRow>> {
        self.take_read_failure()?;
        let mut rows: Vec<PostRow> = self
            .posts
            .read()
            .values()
            .filter(|row| row.timestamp > query.after)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(query.limit as usize);
        Ok(rows)
    }

    fn likes_since(&self, query: &WatermarkQuery) -> SyncResult<Vec<LikeRow>> {
        self.take_read_failure()?;
        let mut rows: Vec<LikeRow> = self
            .likes
            .read()
            .values()
            .filter(|row| row.updated_at.is_some_and(|at| at > query.after))
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.updated_at);
        rows.truncate(query.limit as usize);
        Ok(rows)
    }

    fn comments_since(&self, query: &WatermarkQuery) -> SyncResult<Vec<CommentRow>> {
        self.take_read_failure()?;
        let mut rows: Vec<CommentRow> = self
            .comments
            .read()
            .values()
            .filter(|row| row.updated_at.is_some_and(|at| at > query.after))
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.updated_at);
        rows.truncate(query.limit as usize);
        Ok(rows)
    }
}
