//! Row types for the remote tables.

use chrono::{DateTime, Utc};
use driftsync_store::{Comment, Like, MediaKind, Post, RecordId};
use serde::{Deserialize, Serialize};

/// A row of the remote `posts` table.
///
/// `media_type` and `user_email` are nullable on the wire because older
/// writers omitted them; readers substitute `image` and `anon`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRow {
    /// Client-minted primary key.
    pub id: RecordId,
    /// Body text.
    pub text: String,
    /// Public URL of the image, when `media_type` is `image`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Public URL of the video, when `media_type` is `video`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// `image` or `video`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Public URL of the thumbnail, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Authored time.
    pub timestamp: DateTime<Utc>,
    /// Author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Soft-delete tombstone; the server hard-deletes on its own schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Server-maintained modification time. Never serialized by clients.
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PostRow {
    /// Builds the upsert payload for a local post, routing the uploaded
    /// media URL into `image_url` or `video_url` by kind.
    #[must_use]
    pub fn from_record(post: &Post) -> Self {
        let (image_url, video_url) = match post.media_kind {
            MediaKind::Image => (post.remote_url.clone(), None),
            MediaKind::Video => (None, post.remote_url.clone()),
        };
        Self {
            id: post.id,
            text: post.text.clone(),
            image_url,
            video_url,
            media_type: Some(post.media_kind.as_wire().to_string()),
            thumbnail_url: post.thumbnail_url.clone(),
            timestamp: post.timestamp,
            user_email: Some(post.user_email.clone()),
            deleted_at: post.deleted_at,
            updated_at: None,
        }
    }

    /// The media URL carried by this row: video first, image otherwise.
    #[must_use]
    pub fn media_url(&self) -> Option<&str> {
        self.video_url
            .as_deref()
            .or(self.image_url.as_deref())
    }

    /// The media kind of this row, defaulting to image when absent or
    /// unrecognized.
    #[must_use]
    pub fn media_kind(&self) -> MediaKind {
        self.media_type
            .as_deref()
            .and_then(MediaKind::from_wire)
            .unwrap_or(MediaKind::Image)
    }

    /// The author, defaulting to `anon` when absent.
    #[must_use]
    pub fn author(&self) -> &str {
        self.user_email.as_deref().unwrap_or("anon")
    }
}

/// A row of the remote `likes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeRow {
    /// Client-minted primary key.
    pub id: RecordId,
    /// The liked post.
    pub post_id: RecordId,
    /// Who liked it.
    pub user_email: String,
    /// Soft-delete tombstone; present only in deletion payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Server-maintained modification time. Never serialized by clients.
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LikeRow {
    /// Builds the upsert payload for a local like. Active likes omit
    /// `deleted_at`; tombstoned likes carry it so the server can observe
    /// the deletion.
    #[must_use]
    pub fn from_record(like: &Like) -> Self {
        Self {
            id: like.id,
            post_id: like.post_id,
            user_email: like.user_email.clone(),
            deleted_at: like.deleted_at,
            updated_at: None,
        }
    }
}

/// A row of the remote `comments` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRow {
    /// Client-minted primary key.
    pub id: RecordId,
    /// The commented post.
    pub post_id: RecordId,
    /// Author.
    pub user_email: String,
    /// Body text.
    pub text: String,
    /// Authored time (the local `timestamp`).
    pub created_at: DateTime<Utc>,
    /// Soft-delete tombstone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Server-maintained modification time. Never serialized by clients.
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CommentRow {
    /// Builds the upsert payload for a local comment.
    #[must_use]
    pub fn from_record(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            user_email: comment.user_email.clone(),
            text: comment.text.clone(),
            created_at: comment.timestamp,
            deleted_at: comment.deleted_at,
            updated_at: None,
        }
    }
}
