//! Media path resolution.

use std::path::{Path, PathBuf};

/// Normalizes media identifiers into absolute on-disk paths.
///
/// Three input shapes are accepted:
/// - `file://...` — the scheme is stripped;
/// - `/...` — used as-is;
/// - anything else — joined with the documents directory.
#[derive(Debug, Clone)]
pub struct MediaPathResolver {
    documents_dir: PathBuf,
}

impl MediaPathResolver {
    /// Creates a resolver rooted at the given documents directory.
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
        }
    }

    /// Returns the documents directory.
    #[must_use]
    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    /// Resolves a media identifier to an absolute path.
    #[must_use]
    pub fn full_path(&self, uri: &str) -> PathBuf {
        if let Some(stripped) = uri.strip_prefix("file://") {
            PathBuf::from(stripped)
        } else if uri.starts_with('/') {
            PathBuf::from(uri)
        } else {
            self.documents_dir.join(uri)
        }
    }

    /// Returns true if the resolved path exists.
    ///
    /// All probe failures (missing file, permission denied) collapse to
    /// false; callers only need "can I read this".
    #[must_use]
    pub fn exists(&self, uri: &str) -> bool {
        self.full_path(uri).exists()
    }
}
