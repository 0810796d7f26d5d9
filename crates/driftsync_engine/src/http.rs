//! HTTP binding for the remote store and object buckets.
//!
//! The actual HTTP client is abstracted behind [`HttpClient`] so hosts can
//! plug in whatever library (or platform networking stack) they already
//! carry; this module only owns the JSON encoding and the URL scheme.

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;
use crate::storage::ObjectStorage;
use chrono::SecondsFormat;
use driftsync_protocol::{
    CommentRow, LikeRow, PostRow, WatermarkQuery, COMMENTS_TABLE, LIKES_TABLE, POSTS_TABLE,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// HTTP client abstraction.
///
/// Implementations return the response body on 2xx and an error string
/// otherwise (including transport failures). Timeouts are the client's
/// responsibility; the engine adds no deadline of its own.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request and returns the response body.
    fn get(&self, url: &str) -> Result<Vec<u8>, String>;

    /// Sends a POST request and returns the response body.
    fn post(&self, url: &str, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>, String>;

    /// Returns true if the client believes it can reach the network.
    fn is_healthy(&self) -> bool;
}

/// [`RemoteStore`] over HTTP + JSON.
///
/// Upserts are `POST {base}/rest/{table}` with a JSON array body; the
/// server upserts on the `id` primary key. Selects are
/// `GET {base}/rest/{table}?newer_than=..&by=..&limit=..`.
///
/// Failures never latch: every call reaches the client, so the retry
/// executor above this layer stays meaningful. `is_connected` only reports
/// the result of the most recent call.
pub struct HttpRemote<C: HttpClient> {
    base_url: String,
    client: C,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpRemote<C> {
    /// Creates a remote rooted at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the most recent call succeeded and the client is healthy.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    /// The most recent transport error, if the last call failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn record_success(&self) {
        self.connected.store(true, Ordering::SeqCst);
        *self.last_error.write() = None;
    }

    fn record_failure(&self, message: &str) {
        self.connected.store(false, Ordering::SeqCst);
        *self.last_error.write() = Some(message.to_string());
    }

    fn upsert<T: Serialize>(&self, table: &str, rows: &[T]) -> SyncResult<()> {
        let body = serde_json::to_vec(rows)
            .map_err(|e| SyncError::Protocol(format!("failed to encode {table} rows: {e}")))?;
        let url = format!("{}/rest/{}", self.base_url, table);

        match self.client.post(&url, "application/json", body) {
            Ok(_) => {
                self.record_success();
                Ok(())
            }
            Err(message) => {
                self.record_failure(&message);
                Err(SyncError::transport_retryable(message))
            }
        }
    }

    fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        column: &str,
        query: &WatermarkQuery,
        newest_first: bool,
    ) -> SyncResult<Vec<T>> {
        let after = query.after.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut url = format!(
            "{}/rest/{}?newer_than={}&by={}&limit={}",
            self.base_url, table, after, column, query.limit
        );
        if newest_first {
            url.push_str("&order=desc");
        }

        let bytes = match self.client.get(&url) {
            Ok(bytes) => {
                self.record_success();
                bytes
            }
            Err(message) => {
                self.record_failure(&message);
                return Err(SyncError::transport_retryable(message));
            }
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::Protocol(format!("failed to decode {table} rows: {e}")))
    }
}

impl<C: HttpClient> RemoteStore for HttpRemote<C> {
    fn upsert_post(&self, row: &PostRow) -> SyncResult<()> {
        self.upsert(POSTS_TABLE, std::slice::from_ref(row))
    }

    fn upsert_likes(&self, rows: &[LikeRow]) -> SyncResult<()> {
        self.upsert(LIKES_TABLE, rows)
    }

    fn upsert_comments(&self, rows: &[CommentRow]) -> SyncResult<()> {
        self.upsert(COMMENTS_TABLE, rows)
    }

    fn posts_since(&self, query: &WatermarkQuery) -> SyncResult<Vec<PostRow>> {
        self.select(POSTS_TABLE, "timestamp", query, true)
    }

    fn likes_since(&self, query: &WatermarkQuery) -> SyncResult<Vec<LikeRow>> {
        self.select(LIKES_TABLE, "updated_at", query, false)
    }

    fn comments_since(&self, query: &WatermarkQuery) -> SyncResult<Vec<CommentRow>> {
        self.select(COMMENTS_TABLE, "updated_at", query, false)
    }
}

/// [`ObjectStorage`] over HTTP.
///
/// Objects are written with `POST {base}/storage/{bucket}/{key}?upsert=true`
/// and publicly addressed at `{base}/storage/public/{bucket}/{key}`.
pub struct HttpObjectStorage<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpObjectStorage<C> {
    /// Creates an object storage binding rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

impl<C: HttpClient> ObjectStorage for HttpObjectStorage<C> {
    fn put(&self, bucket: &str, key: &str, content_type: &str, bytes: &[u8]) -> SyncResult<()> {
        let url = format!("{}/storage/{bucket}/{key}?upsert=true", self.base_url);
        self.client
            .post(&url, content_type, bytes.to_vec())
            .map(|_| ())
            .map_err(|message| SyncError::object_storage(bucket, key, message))
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/public/{bucket}/{key}", self.base_url)
    }
}
