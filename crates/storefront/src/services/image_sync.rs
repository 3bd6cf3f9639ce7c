//! Upload directory reconciliation.
//!
//! The served directory lives on ephemeral disk; the permanent directory
//! does not. A pass copies whatever is missing on either side to the other.
//! Same-name files with different content are left as they are.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::services::uploads::validate_filename;

/// Errors from a reconciliation pass.
#[derive(Debug, Error)]
pub enum ImageSyncError {
    #[error("cannot read {dir}: {source}")]
    ListDir {
        dir: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Copied from the permanent store into the served directory
    pub restored: usize,
    /// Copied from the served directory into the permanent store
    pub backed_up: usize,
    pub already_present: usize,
    pub failed: usize,
}

/// Copy every file missing on one side to the other.
///
/// Individual copy failures are counted and logged; the pass continues.
///
/// # Errors
///
/// Returns `ImageSyncError::ListDir` if either directory cannot be created
/// or listed.
pub async fn sync_dirs(permanent: &Path, public: &Path) -> Result<SyncReport, ImageSyncError> {
    let in_permanent = list_files(permanent).await?;
    let in_public = list_files(public).await?;
    let mut report = SyncReport::default();

    for name in in_permanent.union(&in_public) {
        let (from, to, counter) = match (in_permanent.contains(name), in_public.contains(name)) {
            (true, true) => {
                report.already_present += 1;
                continue;
            }
            (true, false) => (permanent, public, &mut report.restored),
            (false, true) => (public, permanent, &mut report.backed_up),
            (false, false) => continue,
        };
        match copy_into(from, to, name).await {
            Ok(()) => *counter += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(file = %name, error = %e, "Failed to reconcile upload");
            }
        }
    }

    tracing::info!(
        restored = report.restored,
        backed_up = report.backed_up,
        already_present = report.already_present,
        failed = report.failed,
        "Upload reconciliation finished"
    );
    Ok(report)
}

/// Make sure one file is in the served directory.
///
/// Returns `false` when neither directory has it.
///
/// # Errors
///
/// Returns `ImageSyncError::InvalidName` for unsafe names and
/// `ImageSyncError::Io` if the copy fails.
pub async fn restore_one(permanent: &Path, public: &Path, name: &str) -> Result<bool, ImageSyncError> {
    let name = validate_filename(name).map_err(|_| ImageSyncError::InvalidName(name.to_string()))?;

    if tokio::fs::try_exists(public.join(name)).await? {
        return Ok(true);
    }
    if !tokio::fs::try_exists(permanent.join(name)).await? {
        return Ok(false);
    }

    copy_into(permanent, public, name).await?;
    tracing::info!(file = %name, "Restored upload from permanent store");
    Ok(true)
}

/// Copy `name` from one directory to another through a hidden temp file,
/// so a half-written copy is never visible under the real name.
pub(crate) async fn copy_into(from: &Path, to: &Path, name: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(to).await?;
    let tmp = to.join(format!(".{name}.partial"));
    tokio::fs::copy(from.join(name), &tmp).await?;
    if let Err(e) = tokio::fs::rename(&tmp, to.join(name)).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Regular, non-hidden files in `dir`. The directory is created if missing.
async fn list_files(dir: &Path) -> Result<BTreeSet<String>, ImageSyncError> {
    let list_err = |source| ImageSyncError::ListDir {
        dir: dir.display().to_string(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(list_err)?;
    let mut entries = tokio::fs::read_dir(dir).await.map_err(list_err)?;

    let mut names = BTreeSet::new();
    while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str()
            && validate_filename(name).is_ok()
        {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_copies_both_directions() {
        let root = tempfile::tempdir().unwrap();
        let permanent = root.path().join("data");
        let public = root.path().join("public");
        tokio::fs::create_dir_all(&permanent).await.unwrap();
        tokio::fs::create_dir_all(&public).await.unwrap();

        tokio::fs::write(permanent.join("only-permanent.png"), b"p").await.unwrap();
        tokio::fs::write(public.join("only-public.png"), b"s").await.unwrap();
        tokio::fs::write(permanent.join("both.png"), b"old").await.unwrap();
        tokio::fs::write(public.join("both.png"), b"new").await.unwrap();
        tokio::fs::write(public.join(".hidden"), b"x").await.unwrap();

        let report = sync_dirs(&permanent, &public).await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                restored: 1,
                backed_up: 1,
                already_present: 1,
                failed: 0,
            }
        );

        assert_eq!(tokio::fs::read(public.join("only-permanent.png")).await.unwrap(), b"p");
        assert_eq!(tokio::fs::read(permanent.join("only-public.png")).await.unwrap(), b"s");
        // Conflicting content is left alone
        assert_eq!(tokio::fs::read(permanent.join("both.png")).await.unwrap(), b"old");
        assert!(!permanent.join(".hidden").exists());

        // Second pass has nothing to do
        let again = sync_dirs(&permanent, &public).await.unwrap();
        assert_eq!(again.restored + again.backed_up, 0);
        assert_eq!(again.already_present, 3);
    }

    #[tokio::test]
    async fn test_sync_creates_missing_directories() {
        let root = tempfile::tempdir().unwrap();
        let permanent = root.path().join("data/uploads");
        let public = root.path().join("public/uploads");
        tokio::fs::create_dir_all(&permanent).await.unwrap();
        tokio::fs::write(permanent.join("a.jpg"), b"a").await.unwrap();

        let report = sync_dirs(&permanent, &public).await.unwrap();
        assert_eq!(report.restored, 1);
        assert!(public.join("a.jpg").exists());
    }

    #[tokio::test]
    async fn test_restore_one() {
        let root = tempfile::tempdir().unwrap();
        let permanent = root.path().join("data");
        let public = root.path().join("public");
        tokio::fs::create_dir_all(&permanent).await.unwrap();
        tokio::fs::write(permanent.join("a.webp"), b"w").await.unwrap();

        assert!(restore_one(&permanent, &public, "a.webp").await.unwrap());
        assert_eq!(tokio::fs::read(public.join("a.webp")).await.unwrap(), b"w");
        assert!(!restore_one(&permanent, &public, "gone.webp").await.unwrap());
        assert!(matches!(
            restore_one(&permanent, &public, "../a.webp").await,
            Err(ImageSyncError::InvalidName(_))
        ));
    }
}
