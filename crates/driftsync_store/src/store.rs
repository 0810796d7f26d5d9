//! The single-writer local store.

use crate::change_feed::{ChangeEvent, ChangeFeed, EntityKind};
use crate::error::{StoreError, StoreResult};
use crate::id::RecordId;
use crate::record::{Comment, Like, Post, SystemSettings};
use crate::transaction::WriteTxn;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::mpsc::Receiver;

/// In-memory tables. `None` settings means the singleton has not been
/// created yet; it is materialized on first access.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) posts: HashMap<RecordId, Post>,
    pub(crate) likes: HashMap<RecordId, Like>,
    pub(crate) comments: HashMap<RecordId, Comment>,
    pub(crate) settings: Option<SystemSettings>,
    pub(crate) sequence: u64,
}

/// The local store: posts, likes, comments and the sync watermark.
///
/// Single-writer, multi-reader. All mutations go through [`LocalStore::write`]
/// and commit atomically; change events fire only after commit. A closed
/// store returns [`StoreError::Closed`] from every entry point, which the
/// sync engine treats as a silent abort.
pub struct LocalStore {
    tables: Mutex<Option<Tables>>,
    feed: ChangeFeed,
}

impl LocalStore {
    /// Opens a fresh in-memory store.
    pub fn open_in_memory() -> Self {
        Self {
            tables: Mutex::new(Some(Tables::default())),
            feed: ChangeFeed::new(),
        }
    }

    /// Closes the store. Subsequent operations fail with [`StoreError::Closed`].
    pub fn close(&self) {
        *self.tables.lock() = None;
    }

    /// Returns true if the store is open.
    pub fn is_open(&self) -> bool {
        self.tables.lock().is_some()
    }

    /// Subscribes to committed changes of one entity kind.
    pub fn subscribe(&self, kind: EntityKind) -> Receiver<ChangeEvent> {
        self.feed.subscribe(kind)
    }

    /// Runs `f` inside a write transaction.
    ///
    /// Writes are staged and applied only if `f` returns `Ok`; on `Err`
    /// nothing is committed. Change events for the commit are emitted after
    /// the write lock is released, in commit order.
    pub fn write<T>(&self, f: impl FnOnce(&mut WriteTxn<'_>) -> StoreResult<T>) -> StoreResult<T> {
        let events;
        let out;
        {
            let mut guard = self.tables.lock();
            let tables = guard.as_mut().ok_or(StoreError::Closed)?;
            let mut txn = WriteTxn::new(tables);
            out = f(&mut txn)?;
            events = txn.commit();
        }
        self.feed.emit_batch(events);
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> StoreResult<T> {
        let guard = self.tables.lock();
        let tables = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(f(tables))
    }

    /// Looks up a post by primary key.
    pub fn post(&self, id: RecordId) -> StoreResult<Option<Post>> {
        self.read(|t| t.posts.get(&id).cloned())
    }

    /// Looks up a like by primary key.
    pub fn like(&self, id: RecordId) -> StoreResult<Option<Like>> {
        self.read(|t| t.likes.get(&id).cloned())
    }

    /// Looks up a comment by primary key.
    pub fn comment(&self, id: RecordId) -> StoreResult<Option<Comment>> {
        self.read(|t| t.comments.get(&id).cloned())
    }

    /// Returns all posts matching the predicate.
    pub fn posts_where(&self, pred: impl Fn(&Post) -> bool) -> StoreResult<Vec<Post>> {
        self.read(|t| t.posts.values().filter(|p| pred(p)).cloned().collect())
    }

    /// Returns all likes matching the predicate.
    pub fn likes_where(&self, pred: impl Fn(&Like) -> bool) -> StoreResult<Vec<Like>> {
        self.read(|t| t.likes.values().filter(|l| pred(l)).cloned().collect())
    }

    /// Returns all comments matching the predicate.
    pub fn comments_where(&self, pred: impl Fn(&Comment) -> bool) -> StoreResult<Vec<Comment>> {
        self.read(|t| t.comments.values().filter(|c| pred(c)).cloned().collect())
    }

    /// Posts pending push, in stable id order.
    pub fn unsynced_posts(&self) -> StoreResult<Vec<Post>> {
        let mut posts = self.posts_where(|p| !p.is_synced)?;
        posts.sort_by_key(|p| p.id);
        Ok(posts)
    }

    /// Likes pending push, in stable id order.
    pub fn unsynced_likes(&self) -> StoreResult<Vec<Like>> {
        let mut likes = self.likes_where(|l| !l.is_synced)?;
        likes.sort_by_key(|l| l.id);
        Ok(likes)
    }

    /// Comments pending push, in stable id order.
    pub fn unsynced_comments(&self) -> StoreResult<Vec<Comment>> {
        let mut comments = self.comments_where(|c| !c.is_synced)?;
        comments.sort_by_key(|c| c.id);
        Ok(comments)
    }

    /// The active (non-tombstoned) like of one user on one post, if any.
    pub fn active_like(
        &self,
        post_id: RecordId,
        user_email: &str,
    ) -> StoreResult<Option<Like>> {
        self.read(|t| {
            t.likes
                .values()
                .find(|l| l.post_id == post_id && l.user_email == user_email && !l.is_tombstoned())
                .cloned()
        })
    }

    /// Reads the settings singleton, creating it with an epoch-zero
    /// watermark on first access.
    pub fn settings(&self) -> StoreResult<SystemSettings> {
        let mut guard = self.tables.lock();
        let tables = guard.as_mut().ok_or(StoreError::Closed)?;
        Ok(tables
            .settings
            .get_or_insert_with(SystemSettings::new)
            .clone())
    }

    /// Toggles the calling user's like on a post.
    ///
    /// An active like is tombstoned; a tombstoned like is resurrected in
    /// place; otherwise a new like is created. All three paths leave the
    /// affected row unsynced. Returns the resulting like.
    pub fn toggle_like(
        &self,
        post_id: RecordId,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Like> {
        self.write(|txn| Ok(txn.toggle_like(post_id, user_email, now)))
    }
}
