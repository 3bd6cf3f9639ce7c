//! Backup commands.
//!
//! These run the same passes as the server's background jobs. Running them
//! while the server is up is safe for `status` and `verify`; `run` and
//! `restore` do not take the server's job lock, so avoid overlapping them
//! with a scheduled pass.

use gerinmah_storefront::config::StorageConfig;
use gerinmah_storefront::services::backup::{BackupService, BackupStatus, RestoreStatus};
use gerinmah_storefront::services::BackupError;
use thiserror::Error;

use super::{CliError, connect, print_report};

#[derive(Debug, Error)]
pub enum BackupCommandError {
    #[error(transparent)]
    Cli(#[from] CliError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),
}

async fn service() -> Result<BackupService, CliError> {
    let pool = connect().await?;
    let dir = StorageConfig::from_env().backup_dir;
    tracing::info!(dir = %dir.display(), "Using snapshot directory");
    Ok(BackupService::new(pool, dir))
}

/// Snapshot every critical table.
pub async fn run() -> Result<(), BackupCommandError> {
    let reports = service().await?.backup_all().await;
    print_report(&reports)?;

    let failed = reports
        .iter()
        .filter(|r| r.status == BackupStatus::Failed)
        .count();
    if failed > 0 {
        return Err(CliError::Failed(format!("{failed} table(s) failed to back up")).into());
    }
    Ok(())
}

/// Restore rows missing from the live tables.
pub async fn restore() -> Result<(), BackupCommandError> {
    let reports = service().await?.restore_all().await;
    print_report(&reports)?;

    let inserted: usize = reports.iter().map(|r| r.inserted).sum();
    tracing::info!(inserted, "Restore finished");

    let failed = reports
        .iter()
        .filter(|r| r.status == RestoreStatus::Failed)
        .count();
    if failed > 0 {
        return Err(CliError::Failed(format!("{failed} table(s) failed to restore")).into());
    }
    Ok(())
}

/// Report sampled rows that are missing, without writing anything.
pub async fn verify() -> Result<(), BackupCommandError> {
    let reports = service().await?.verify_all().await?;
    print_report(&reports)?;

    let missing: usize = reports.iter().map(|r| r.missing.len()).sum();
    if missing > 0 {
        tracing::warn!(missing, "Sampled rows missing; run `gm-cli backup restore`");
    }
    Ok(())
}

/// Show snapshot metadata for every table.
pub async fn status() -> Result<(), BackupCommandError> {
    let reports = service().await?.status().await;
    print_report(&reports)?;
    Ok(())
}
