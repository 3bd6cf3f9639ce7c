//! Upload maintenance commands.

use gerinmah_storefront::config::StorageConfig;
use gerinmah_storefront::services::image_sync::{ImageSyncError, sync_dirs};
use thiserror::Error;

use super::{CliError, print_report};

#[derive(Debug, Error)]
pub enum UploadsCommandError {
    #[error(transparent)]
    Cli(#[from] CliError),

    #[error("Image sync error: {0}")]
    Sync(#[from] ImageSyncError),
}

/// Reconcile the permanent and served upload directories.
///
/// Needs no database; only the directory variables are read.
pub async fn sync() -> Result<(), UploadsCommandError> {
    dotenvy::dotenv().ok();
    let storage = StorageConfig::from_env();

    tracing::info!(
        permanent = %storage.permanent_upload_dir.display(),
        public = %storage.public_upload_dir.display(),
        "Reconciling upload directories"
    );
    let report = sync_dirs(&storage.permanent_upload_dir, &storage.public_upload_dir).await?;
    print_report(&report)?;

    if report.failed > 0 {
        return Err(CliError::Failed(format!("{} file(s) failed to copy", report.failed)).into());
    }
    Ok(())
}
