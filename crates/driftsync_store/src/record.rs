//! Entity definitions and sync bookkeeping.

use crate::id::RecordId;
use chrono::{DateTime, TimeZone, Utc};

/// Kind of media attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// A still image, stored as JPEG.
    Image,
    /// A video clip, stored as MP4.
    Video,
}

impl MediaKind {
    /// Object-storage bucket holding this kind of media.
    #[must_use]
    pub const fn bucket(self) -> &'static str {
        match self {
            MediaKind::Image => "media",
            MediaKind::Video => "reels",
        }
    }

    /// File extension used in object keys.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
        }
    }

    /// Content type sent with uploads.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
        }
    }

    /// Wire name of this kind.
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Parses the wire name. Unknown values return `None`.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// A feed post with optionally attached media.
///
/// `is_synced` means the remote holds this record's current field values;
/// any mutation clears it in the same transaction. `deleted_at` is the
/// soft-delete tombstone: set on delete, cleared only by resurrection paths,
/// and reaped by the pruner once past retention.
///
/// `synced_text` and `synced_remote_url` snapshot the field values the remote
/// last acknowledged. They are the merge base for field-level conflict
/// resolution during pull and are refreshed whenever `is_synced` flips true.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Client-minted primary key.
    pub id: RecordId,
    /// Body text.
    pub text: String,
    /// Authored time. Does not advance on edits or soft delete.
    pub timestamp: DateTime<Utc>,
    /// Kind of the attached media.
    pub media_kind: MediaKind,
    /// Local media location: a `file://` uri, an absolute path, or a bare
    /// name under the documents directory.
    pub local_uri: Option<String>,
    /// Public URL of the uploaded media, once the upload succeeded.
    pub remote_url: Option<String>,
    /// Public URL of the thumbnail, if any.
    pub thumbnail_url: Option<String>,
    /// Author.
    pub user_email: String,
    /// Whether the remote holds the current field values.
    pub is_synced: bool,
    /// Soft-delete tombstone.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Merge base for `text`, captured at the last sync.
    pub synced_text: Option<String>,
    /// Merge base for `remote_url`, captured at the last sync.
    pub synced_remote_url: Option<String>,
}

impl Post {
    /// Creates a new locally-authored post, pending sync.
    pub fn new(
        text: impl Into<String>,
        media_kind: MediaKind,
        user_email: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            text: text.into(),
            timestamp,
            media_kind,
            local_uri: None,
            remote_url: None,
            thumbnail_url: None,
            user_email: user_email.into(),
            is_synced: false,
            deleted_at: None,
            synced_text: None,
            synced_remote_url: None,
        }
    }

    /// Sets the local media uri.
    #[must_use]
    pub fn with_local_uri(mut self, uri: impl Into<String>) -> Self {
        self.local_uri = Some(uri.into());
        self
    }

    /// Sets the thumbnail URL.
    #[must_use]
    pub fn with_thumbnail_url(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// Returns true if this post carries a tombstone.
    #[must_use]
    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns true if the post has media that still needs uploading.
    #[must_use]
    pub fn needs_media_upload(&self) -> bool {
        self.local_uri.is_some() && self.remote_url.is_none()
    }
}

/// A like on a post.
///
/// At most one like per (post, user) is active at any time; the toggle
/// operation resurrects a tombstoned row instead of inserting a duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Like {
    /// Client-minted primary key.
    pub id: RecordId,
    /// The liked post.
    pub post_id: RecordId,
    /// Who liked it.
    pub user_email: String,
    /// Whether the remote holds the current field values.
    pub is_synced: bool,
    /// Soft-delete tombstone.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Like {
    /// Creates a new active like, pending sync.
    pub fn new(post_id: RecordId, user_email: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            post_id,
            user_email: user_email.into(),
            is_synced: false,
            deleted_at: None,
        }
    }

    /// Returns true if this like carries a tombstone.
    #[must_use]
    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// Client-minted primary key.
    pub id: RecordId,
    /// The commented post.
    pub post_id: RecordId,
    /// Author.
    pub user_email: String,
    /// Body text.
    pub text: String,
    /// Authored time.
    pub timestamp: DateTime<Utc>,
    /// Whether the remote holds the current field values.
    pub is_synced: bool,
    /// Soft-delete tombstone.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Merge base for `text`, captured at the last sync.
    pub synced_text: Option<String>,
}

impl Comment {
    /// Creates a new comment, pending sync.
    pub fn new(
        post_id: RecordId,
        user_email: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            post_id,
            user_email: user_email.into(),
            text: text.into(),
            timestamp,
            is_synced: false,
            deleted_at: None,
            synced_text: None,
        }
    }

    /// Returns true if this comment carries a tombstone.
    #[must_use]
    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Singleton row holding the pull watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSettings {
    /// Id of the singleton row.
    pub id: RecordId,
    /// Remote changes at or before this instant have been seen. Never
    /// decreases.
    pub last_sync_time: DateTime<Utc>,
}

impl SystemSettings {
    /// Creates fresh settings with the watermark at epoch zero.
    pub fn new() -> Self {
        Self {
            id: RecordId::new(),
            last_sync_time: epoch(),
        }
    }
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// The epoch-zero watermark used by a freshly created store.
#[must_use]
pub(crate) fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_else(Utc::now)
}
