//! Image uploads.
//!
//! Files are written to the permanent store first and then copied into the
//! served directory. A failed copy is not fatal: reconciliation brings the
//! served side back later.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::StorageConfig;
use crate::services::image_sync::{self, ImageSyncError, SyncReport};

/// Largest accepted upload (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// URL prefix the served directory is mounted under.
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

const ALLOWED_EXTENSIONS: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
];

/// Errors from storing or locating uploads.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload is empty")]
    Empty,

    #[error("upload is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file that has been stored.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Generated `<uuid>.<ext>` name
    pub filename: String,
    pub original_name: String,
    pub mime_type: &'static str,
    pub size_bytes: i64,
    /// Public URL, e.g. `/uploads/<filename>`
    pub url: String,
}

/// Upload storage over the permanent and served directories.
#[derive(Debug, Clone)]
pub struct UploadStore {
    permanent_dir: PathBuf,
    public_dir: PathBuf,
}

impl UploadStore {
    #[must_use]
    pub fn new(storage: &StorageConfig) -> Self {
        Self::with_dirs(
            storage.permanent_upload_dir.clone(),
            storage.public_upload_dir.clone(),
        )
    }

    #[must_use]
    pub const fn with_dirs(permanent_dir: PathBuf, public_dir: PathBuf) -> Self {
        Self {
            permanent_dir,
            public_dir,
        }
    }

    #[must_use]
    pub fn permanent_dir(&self) -> &Path {
        &self.permanent_dir
    }

    #[must_use]
    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Store an uploaded image under a fresh `<uuid>.<ext>` name.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Empty`, `TooLarge` or `UnsupportedType` for
    /// rejected input, and `UploadError::Io` if the permanent write fails.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredUpload, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                limit: MAX_UPLOAD_BYTES,
            });
        }
        let (ext, mime_type) = image_type(original_name)?;
        let filename = format!("{}.{ext}", uuid::Uuid::new_v4());

        tokio::fs::create_dir_all(&self.permanent_dir).await?;
        tokio::fs::write(self.permanent_dir.join(&filename), bytes).await?;

        if let Err(e) = image_sync::copy_into(&self.permanent_dir, &self.public_dir, &filename).await {
            tracing::warn!(
                filename = %filename,
                error = %e,
                "Stored upload but could not copy it to the served directory"
            );
        }

        tracing::info!(filename = %filename, size = bytes.len(), "Stored upload");

        Ok(StoredUpload {
            url: format!("{UPLOADS_URL_PREFIX}{filename}"),
            filename,
            original_name: original_name.to_string(),
            mime_type,
            size_bytes: i64::try_from(bytes.len()).unwrap_or(i64::MAX),
        })
    }

    /// Remove a stored file from both directories. Missing files are ignored.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidName` for unsafe names and
    /// `UploadError::Io` for other filesystem failures.
    pub async fn remove(&self, filename: &str) -> Result<(), UploadError> {
        let filename = validate_filename(filename)?;
        for dir in [&self.permanent_dir, &self.public_dir] {
            match tokio::fs::remove_file(dir.join(filename)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Run a full reconciliation pass between the two directories.
    ///
    /// # Errors
    ///
    /// Returns `ImageSyncError` if either directory cannot be listed.
    pub async fn sync(&self) -> Result<SyncReport, ImageSyncError> {
        image_sync::sync_dirs(&self.permanent_dir, &self.public_dir).await
    }

    /// Make sure `filename` is present in the served directory, copying it
    /// back from the permanent store if needed.
    ///
    /// Returns the served path, or `None` when neither side has the file.
    ///
    /// # Errors
    ///
    /// Returns `ImageSyncError` for unsafe names or a failed copy.
    pub async fn ensure_served(&self, filename: &str) -> Result<Option<PathBuf>, ImageSyncError> {
        let found = image_sync::restore_one(&self.permanent_dir, &self.public_dir, filename).await?;
        Ok(found.then(|| self.public_dir.join(filename)))
    }
}

/// Check that a name taken from a URL is a plain file name.
///
/// # Errors
///
/// Returns `UploadError::InvalidName` for empty names, path separators,
/// `..`, and hidden (dot-prefixed) names.
pub fn validate_filename(name: &str) -> Result<&str, UploadError> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains("..")
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(UploadError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Extract the stored file name from an `/uploads/<name>` URL.
#[must_use]
pub fn filename_from_url(url: &str) -> Option<&str> {
    url.strip_prefix(UPLOADS_URL_PREFIX)
        .and_then(|name| validate_filename(name).ok())
}

/// Lowercased extension and MIME type for an accepted image name.
fn image_type(original_name: &str) -> Result<(String, &'static str), UploadError> {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| UploadError::UnsupportedType(original_name.to_string()))?;

    ALLOWED_EXTENSIONS
        .iter()
        .find(|(allowed, _)| *allowed == ext)
        .map(|(_, mime)| (ext.clone(), *mime))
        .ok_or(UploadError::UnsupportedType(ext))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store(root: &Path) -> UploadStore {
        UploadStore::with_dirs(root.join("data/uploads"), root.join("public/uploads"))
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("3f1c.jpg").is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename(".env").is_err());
        assert!(validate_filename("../secrets.txt").is_err());
        assert!(validate_filename("a/b.png").is_err());
        assert!(validate_filename("a\\b.png").is_err());
        assert!(validate_filename("a..png").is_err());
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("/uploads/abc.png"), Some("abc.png"));
        assert_eq!(filename_from_url("/uploads/../etc/passwd"), None);
        assert_eq!(filename_from_url("https://cdn.example.mn/abc.png"), None);
    }

    #[test]
    fn test_image_type() {
        assert_eq!(image_type("Photo.JPG").unwrap(), ("jpg".to_string(), "image/jpeg"));
        assert_eq!(image_type("logo.webp").unwrap().1, "image/webp");
        assert!(matches!(image_type("evil.svg"), Err(UploadError::UnsupportedType(_))));
        assert!(matches!(image_type("noext"), Err(UploadError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn test_save_writes_both_directories() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());

        let stored = store.save("мах.png", b"png-bytes").await.unwrap();
        assert!(stored.filename.ends_with(".png"));
        assert_eq!(stored.url, format!("/uploads/{}", stored.filename));
        assert_eq!(stored.size_bytes, 9);

        let permanent = tokio::fs::read(store.permanent_dir().join(&stored.filename)).await.unwrap();
        let served = tokio::fs::read(store.public_dir().join(&stored.filename)).await.unwrap();
        assert_eq!(permanent, b"png-bytes");
        assert_eq!(served, b"png-bytes");
    }

    #[tokio::test]
    async fn test_save_rejects_bad_uploads() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());

        assert!(matches!(store.save("a.png", b"").await, Err(UploadError::Empty)));
        assert!(matches!(
            store.save("a.exe", b"MZ").await,
            Err(UploadError::UnsupportedType(_))
        ));
        let big = vec![0u8; MAX_UPLOAD_BYTES + 1];
        assert!(matches!(
            store.save("a.png", &big).await,
            Err(UploadError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_served_file_survives_wipe() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());
        let stored = store.save("a.jpg", b"jpeg").await.unwrap();

        tokio::fs::remove_dir_all(store.public_dir()).await.unwrap();

        let path = store.ensure_served(&stored.filename).await.unwrap().unwrap();
        assert_eq!(tokio::fs::read(path).await.unwrap(), b"jpeg");
        assert!(store.ensure_served("missing.jpg").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_deletes_both_copies() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());
        let stored = store.save("a.gif", b"gif").await.unwrap();

        store.remove(&stored.filename).await.unwrap();
        // Second removal is a no-op
        store.remove(&stored.filename).await.unwrap();

        assert!(!store.permanent_dir().join(&stored.filename).exists());
        assert!(!store.public_dir().join(&stored.filename).exists());
        assert!(store.remove("../x").await.is_err());
    }
}
