//! Media upload.

use crate::resolver::MediaPathResolver;
use crate::retry::RetryExecutor;
use crate::storage::ObjectStorage;
use driftsync_store::{MediaKind, RecordId};
use std::fs;
use tracing::warn;

/// Streams a local media file into the object bucket for its kind, under a
/// deterministic key, and returns the public URL.
///
/// A missing local file fails fast with no network I/O. On any failure the
/// uploader returns `None`; the caller must neither advance the record's
/// sync flag nor write a remote URL.
pub struct MediaUploader<'a> {
    resolver: &'a MediaPathResolver,
    storage: &'a dyn ObjectStorage,
    retry: &'a RetryExecutor,
}

impl<'a> MediaUploader<'a> {
    /// Creates an uploader over the given resolver, bucket store and retry
    /// executor.
    pub fn new(
        resolver: &'a MediaPathResolver,
        storage: &'a dyn ObjectStorage,
        retry: &'a RetryExecutor,
    ) -> Self {
        Self {
            resolver,
            storage,
            retry,
        }
    }

    /// Uploads the file at `local_uri` as `<id>.<ext>` into the kind's
    /// bucket. Returns the object's public URL, or `None` on any failure.
    pub fn upload(&self, local_uri: &str, id: RecordId, kind: MediaKind) -> Option<String> {
        if !self.resolver.exists(local_uri) {
            warn!(uri = local_uri, "media file missing, skipping upload");
            return None;
        }

        let path = self.resolver.full_path(local_uri);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(path = %path.display(), %error, "could not read media file");
                return None;
            }
        };

        let bucket = kind.bucket();
        let key = format!("{}.{}", id.as_hex(), kind.extension());

        self.retry
            .execute("media upload", || {
                self.storage.put(bucket, &key, kind.content_type(), &bytes)
            })
            .map(|()| self.storage.public_url(bucket, &key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::storage::MemoryObjectStorage;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn fast_retry() -> RetryExecutor {
        RetryExecutor::new(RetryPolicy::new(3).with_base_delay(Duration::ZERO))
    }

    #[test]
    fn image_lands_in_media_bucket() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"jpeg bytes").unwrap();

        let resolver = MediaPathResolver::new(dir.path());
        let storage = MemoryObjectStorage::new();
        let retry = fast_retry();
        let uploader = MediaUploader::new(&resolver, &storage, &retry);

        let id = RecordId::new();
        let url = uploader.upload("a.jpg", id, MediaKind::Image).unwrap();

        let key = format!("{}.jpg", id.as_hex());
        assert_eq!(url, format!("https://objects.test/media/{key}"));
        assert_eq!(storage.object("media", &key).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn video_lands_in_reels_bucket() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("clip.mp4"), b"mp4 bytes").unwrap();

        let resolver = MediaPathResolver::new(dir.path());
        let storage = MemoryObjectStorage::new();
        let retry = fast_retry();
        let uploader = MediaUploader::new(&resolver, &storage, &retry);

        let id = RecordId::new();
        let url = uploader.upload("clip.mp4", id, MediaKind::Video).unwrap();
        assert!(url.contains("/reels/"));
        assert!(url.ends_with(".mp4"));
    }

    #[test]
    fn missing_file_fails_without_touching_storage() {
        let dir = tempdir().unwrap();
        let resolver = MediaPathResolver::new(dir.path());
        let storage = MemoryObjectStorage::new();
        let retry = fast_retry();
        let uploader = MediaUploader::new(&resolver, &storage, &retry);

        assert!(uploader
            .upload("nope.jpg", RecordId::new(), MediaKind::Image)
            .is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn transient_failure_is_retried_then_succeeds() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();

        let resolver = MediaPathResolver::new(dir.path());
        let storage = MemoryObjectStorage::new();
        storage.fail_next_puts(2);
        let retry = fast_retry();
        let uploader = MediaUploader::new(&resolver, &storage, &retry);

        assert!(uploader
            .upload("a.jpg", RecordId::new(), MediaKind::Image)
            .is_some());
    }

    #[test]
    fn exhausted_retries_return_none() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();

        let resolver = MediaPathResolver::new(dir.path());
        let storage = MemoryObjectStorage::new();
        storage.fail_next_puts(10);
        let retry = fast_retry();
        let uploader = MediaUploader::new(&resolver, &storage, &retry);

        assert!(uploader
            .upload("a.jpg", RecordId::new(), MediaKind::Image)
            .is_none());
    }
}
