//! Write transactions with staged-overlay semantics.

use crate::change_feed::{ChangeEvent, ChangeType, EntityKind};
use crate::error::{StoreError, StoreResult};
use crate::id::RecordId;
use crate::record::{Comment, Like, Post, SystemSettings};
use crate::store::Tables;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A single-writer transaction over the store tables.
///
/// Mutations are staged in overlays; reads inside the transaction observe
/// the staged state. Nothing touches the base tables until the transaction
/// callback returns `Ok` and [`WriteTxn::commit`] applies the overlays as
/// one unit. A staged `None` is a hard delete.
pub struct WriteTxn<'a> {
    tables: &'a mut Tables,
    posts: HashMap<RecordId, Option<Post>>,
    likes: HashMap<RecordId, Option<Like>>,
    comments: HashMap<RecordId, Option<Comment>>,
    settings: Option<SystemSettings>,
}

impl<'a> WriteTxn<'a> {
    pub(crate) fn new(tables: &'a mut Tables) -> Self {
        Self {
            tables,
            posts: HashMap::new(),
            likes: HashMap::new(),
            comments: HashMap::new(),
            settings: None,
        }
    }

    /// Applies the staged overlays to the base tables and returns the change
    /// events of this commit. All events share one commit sequence number.
    pub(crate) fn commit(self) -> Vec<ChangeEvent> {
        let Self {
            tables,
            posts,
            likes,
            comments,
            settings,
        } = self;

        let mut changes: Vec<(EntityKind, RecordId, ChangeType)> = Vec::new();

        let mut staged_posts: Vec<_> = posts.into_iter().collect();
        staged_posts.sort_by_key(|(id, _)| *id);
        for (id, staged) in staged_posts {
            match staged {
                Some(post) => {
                    let change = if tables.posts.contains_key(&id) {
                        ChangeType::Update
                    } else {
                        ChangeType::Insert
                    };
                    tables.posts.insert(id, post);
                    changes.push((EntityKind::Post, id, change));
                }
                None => {
                    if tables.posts.remove(&id).is_some() {
                        changes.push((EntityKind::Post, id, ChangeType::Delete));
                    }
                }
            }
        }

        let mut staged_likes: Vec<_> = likes.into_iter().collect();
        staged_likes.sort_by_key(|(id, _)| *id);
        for (id, staged) in staged_likes {
            match staged {
                Some(like) => {
                    let change = if tables.likes.contains_key(&id) {
                        ChangeType::Update
                    } else {
                        ChangeType::Insert
                    };
                    tables.likes.insert(id, like);
                    changes.push((EntityKind::Like, id, change));
                }
                None => {
                    if tables.likes.remove(&id).is_some() {
                        changes.push((EntityKind::Like, id, ChangeType::Delete));
                    }
                }
            }
        }

        let mut staged_comments: Vec<_> = comments.into_iter().collect();
        staged_comments.sort_by_key(|(id, _)| *id);
        for (id, staged) in staged_comments {
            match staged {
                Some(comment) => {
                    let change = if tables.comments.contains_key(&id) {
                        ChangeType::Update
                    } else {
                        ChangeType::Insert
                    };
                    tables.comments.insert(id, comment);
                    changes.push((EntityKind::Comment, id, change));
                }
                None => {
                    if tables.comments.remove(&id).is_some() {
                        changes.push((EntityKind::Comment, id, ChangeType::Delete));
                    }
                }
            }
        }

        if let Some(new_settings) = settings {
            let change = if tables.settings.is_some() {
                ChangeType::Update
            } else {
                ChangeType::Insert
            };
            changes.push((EntityKind::Settings, new_settings.id, change));
            tables.settings = Some(new_settings);
        }

        if changes.is_empty() {
            return Vec::new();
        }

        tables.sequence += 1;
        let sequence = tables.sequence;
        changes
            .into_iter()
            .map(|(kind, id, change)| ChangeEvent {
                sequence,
                kind,
                id,
                change,
            })
            .collect()
    }

    // ----- overlay-aware reads -----

    /// Looks up a post, observing staged writes.
    pub fn get_post(&self, id: RecordId) -> Option<Post> {
        match self.posts.get(&id) {
            Some(staged) => staged.clone(),
            None => self.tables.posts.get(&id).cloned(),
        }
    }

    /// Looks up a like, observing staged writes.
    pub fn get_like(&self, id: RecordId) -> Option<Like> {
        match self.likes.get(&id) {
            Some(staged) => staged.clone(),
            None => self.tables.likes.get(&id).cloned(),
        }
    }

    /// Looks up a comment, observing staged writes.
    pub fn get_comment(&self, id: RecordId) -> Option<Comment> {
        match self.comments.get(&id) {
            Some(staged) => staged.clone(),
            None => self.tables.comments.get(&id).cloned(),
        }
    }

    /// All posts as the transaction currently sees them.
    pub fn posts(&self) -> Vec<Post> {
        let mut out: Vec<Post> = self
            .tables
            .posts
            .iter()
            .filter(|(id, _)| !self.posts.contains_key(id))
            .map(|(_, p)| p.clone())
            .collect();
        out.extend(self.posts.values().filter_map(|p| p.clone()));
        out
    }

    /// All likes as the transaction currently sees them.
    pub fn likes(&self) -> Vec<Like> {
        let mut out: Vec<Like> = self
            .tables
            .likes
            .iter()
            .filter(|(id, _)| !self.likes.contains_key(id))
            .map(|(_, l)| l.clone())
            .collect();
        out.extend(self.likes.values().filter_map(|l| l.clone()));
        out
    }

    /// All comments as the transaction currently sees them.
    pub fn comments(&self) -> Vec<Comment> {
        let mut out: Vec<Comment> = self
            .tables
            .comments
            .iter()
            .filter(|(id, _)| !self.comments.contains_key(id))
            .map(|(_, c)| c.clone())
            .collect();
        out.extend(self.comments.values().filter_map(|c| c.clone()));
        out
    }

    /// The settings singleton as the transaction sees it, materializing it
    /// if it does not exist yet.
    pub fn settings(&mut self) -> SystemSettings {
        if let Some(staged) = &self.settings {
            return staged.clone();
        }
        match &self.tables.settings {
            Some(base) => base.clone(),
            None => {
                let fresh = SystemSettings::new();
                self.settings = Some(fresh.clone());
                fresh
            }
        }
    }

    // ----- raw writes -----

    /// Stages an insert-or-replace of a post.
    pub fn put_post(&mut self, post: Post) {
        self.posts.insert(post.id, Some(post));
    }

    /// Stages an insert-or-replace of a like.
    pub fn put_like(&mut self, like: Like) {
        self.likes.insert(like.id, Some(like));
    }

    /// Stages an insert-or-replace of a comment.
    pub fn put_comment(&mut self, comment: Comment) {
        self.comments.insert(comment.id, Some(comment));
    }

    /// Stages a hard delete of a post. Used by the pruner only.
    pub fn delete_post(&mut self, id: RecordId) {
        self.posts.insert(id, None);
    }

    /// Stages a hard delete of a like. Used by the pruner only.
    pub fn delete_like(&mut self, id: RecordId) {
        self.likes.insert(id, None);
    }

    /// Stages a hard delete of a comment. Used by the pruner only.
    pub fn delete_comment(&mut self, id: RecordId) {
        self.comments.insert(id, None);
    }

    // ----- domain operations -----

    /// Rewrites a post's text, leaving the authored timestamp alone and
    /// clearing the sync flag.
    pub fn set_post_text(&mut self, id: RecordId, text: impl Into<String>) -> StoreResult<()> {
        let mut post = self
            .get_post(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Post, id))?;
        post.text = text.into();
        post.is_synced = false;
        self.put_post(post);
        Ok(())
    }

    /// Records the public URL of uploaded media. Part of the push cycle, so
    /// the sync flag is left as-is.
    pub fn set_post_remote_url(
        &mut self,
        id: RecordId,
        url: impl Into<String>,
    ) -> StoreResult<()> {
        let mut post = self
            .get_post(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Post, id))?;
        post.remote_url = Some(url.into());
        self.put_post(post);
        Ok(())
    }

    /// Flags a post as acknowledged by the remote and refreshes its merge
    /// base snapshots.
    pub fn mark_post_synced(&mut self, id: RecordId) -> StoreResult<()> {
        let mut post = self
            .get_post(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Post, id))?;
        post.is_synced = true;
        post.synced_text = Some(post.text.clone());
        post.synced_remote_url = post.remote_url.clone();
        self.put_post(post);
        Ok(())
    }

    /// Tombstones a post and clears its sync flag.
    pub fn soft_delete_post(&mut self, id: RecordId, now: DateTime<Utc>) -> StoreResult<()> {
        let mut post = self
            .get_post(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Post, id))?;
        post.deleted_at = Some(now);
        post.is_synced = false;
        self.put_post(post);
        Ok(())
    }

    /// Flags a like as acknowledged by the remote.
    pub fn mark_like_synced(&mut self, id: RecordId) -> StoreResult<()> {
        let mut like = self
            .get_like(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Like, id))?;
        like.is_synced = true;
        self.put_like(like);
        Ok(())
    }

    /// Tombstones a like and clears its sync flag.
    pub fn soft_delete_like(&mut self, id: RecordId, now: DateTime<Utc>) -> StoreResult<()> {
        let mut like = self
            .get_like(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Like, id))?;
        like.deleted_at = Some(now);
        like.is_synced = false;
        self.put_like(like);
        Ok(())
    }

    /// Rewrites a comment's text and clears the sync flag.
    pub fn set_comment_text(
        &mut self,
        id: RecordId,
        text: impl Into<String>,
    ) -> StoreResult<()> {
        let mut comment = self
            .get_comment(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Comment, id))?;
        comment.text = text.into();
        comment.is_synced = false;
        self.put_comment(comment);
        Ok(())
    }

    /// Flags a comment as acknowledged by the remote and refreshes its merge
    /// base snapshot.
    pub fn mark_comment_synced(&mut self, id: RecordId) -> StoreResult<()> {
        let mut comment = self
            .get_comment(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Comment, id))?;
        comment.is_synced = true;
        comment.synced_text = Some(comment.text.clone());
        self.put_comment(comment);
        Ok(())
    }

    /// Tombstones a comment and clears its sync flag.
    pub fn soft_delete_comment(&mut self, id: RecordId, now: DateTime<Utc>) -> StoreResult<()> {
        let mut comment = self
            .get_comment(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Comment, id))?;
        comment.deleted_at = Some(now);
        comment.is_synced = false;
        self.put_comment(comment);
        Ok(())
    }

    /// Toggles a user's like on a post, resurrecting a tombstoned row
    /// instead of inserting a duplicate. Keeps the at-most-one-active-like
    /// invariant per (post, user).
    pub fn toggle_like(
        &mut self,
        post_id: RecordId,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> Like {
        let mut existing: Vec<Like> = self
            .likes()
            .into_iter()
            .filter(|l| l.post_id == post_id && l.user_email == user_email)
            .collect();
        existing.sort_by_key(|l| l.id);

        if let Some(active) = existing.iter().find(|l| !l.is_tombstoned()) {
            let mut like = active.clone();
            like.deleted_at = Some(now);
            like.is_synced = false;
            self.put_like(like.clone());
            return like;
        }

        if let Some(tombstoned) = existing.first() {
            let mut like = tombstoned.clone();
            like.deleted_at = None;
            like.is_synced = false;
            self.put_like(like.clone());
            return like;
        }

        let like = Like::new(post_id, user_email);
        self.put_like(like.clone());
        like
    }

    /// Advances the pull watermark. The watermark never decreases.
    pub fn advance_watermark(&mut self, to: DateTime<Utc>) {
        let mut settings = self.settings();
        if to > settings.last_sync_time {
            settings.last_sync_time = to;
        }
        self.settings = Some(settings);
    }
}
