//! Manual job triggers for the admin panel.
//!
//! Each trigger runs a full pass and waits for it. If the scheduler is in
//! the middle of the same pass, the request waits for that one first.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::services::backup::{BackupStatus, RestoreStatus, TableBackupReport, TableRestoreReport};
use crate::services::image_sync::SyncReport;
use crate::services::jobs::BackupOverview;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/backup", post(run_backup))
        .route("/api/admin/restore", post(run_restore))
        .route("/api/admin/backup/status", get(backup_status))
        .route("/api/admin/uploads/sync", post(sync_uploads))
}

/// Result of a manual backup or restore pass.
#[derive(Debug, Serialize)]
pub struct PassResult<T> {
    pub success: bool,
    pub tables: Vec<T>,
}

/// Snapshot every critical table now.
///
/// `success` is false when any table failed; the per-table reports say which.
///
/// # Route
///
/// `POST /api/admin/backup`
pub async fn run_backup(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Json<PassResult<TableBackupReport>> {
    let tables = state.jobs().run_backup().await;
    let success = tables.iter().all(|t| t.status != BackupStatus::Failed);
    tracing::info!(success, "Manual backup finished");
    Json(PassResult { success, tables })
}

/// Check every table against its snapshot and restore missing rows.
///
/// The pass itself drops the cached pending-order count when rows come back.
///
/// # Route
///
/// `POST /api/admin/restore`
pub async fn run_restore(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Json<PassResult<TableRestoreReport>> {
    let tables = state.jobs().run_restore().await;
    let success = tables.iter().all(|t| t.status != RestoreStatus::Failed);
    tracing::info!(success, "Manual restore finished");
    Json(PassResult { success, tables })
}

/// Snapshot files and the latest job results.
///
/// # Route
///
/// `GET /api/admin/backup/status`
pub async fn backup_status(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Json<BackupOverview> {
    Json(state.jobs().overview().await)
}

/// Reconcile the permanent and served upload directories now.
///
/// # Route
///
/// `POST /api/admin/uploads/sync`
///
/// # Errors
///
/// Returns 500 if a directory cannot be listed.
pub async fn sync_uploads(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<SyncReport>, AppError> {
    let report = state.jobs().run_image_sync().await?;
    Ok(Json(report))
}
