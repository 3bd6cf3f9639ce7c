//! Media library handlers.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use gerinmah_core::MediaId;

use crate::db::MediaRepository;
use crate::db::media::NewMedia;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::MediaItem;
use crate::state::AppState;

use super::{Success, UploadForm, success, upload_limit};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/media", get(list_media))
        .route("/api/media/upload", post(upload_media).layer(upload_limit()))
        .route("/api/media/{id}", delete(delete_media))
}

/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_media(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<MediaItem>>, AppError> {
    Ok(Json(MediaRepository::new(state.pool()).list().await?))
}

/// Upload an image (`file` part, optional `altText` field).
///
/// # Route
///
/// `POST /api/media/upload`
///
/// # Errors
///
/// Returns 400 or 413 if the image is rejected.
pub async fn upload_media(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.require_file()?;
    let stored = state
        .uploads()
        .save(&file.original_name, &file.bytes)
        .await?;

    let created = MediaRepository::new(state.pool())
        .create(&NewMedia {
            filename: &stored.filename,
            original_name: &stored.original_name,
            mime_type: stored.mime_type,
            size_bytes: stored.size_bytes,
            url: &stored.url,
            alt_text: form.field("altText"),
        })
        .await;

    match created {
        Ok(item) => Ok((StatusCode::CREATED, Json(item))),
        Err(e) => {
            if let Err(cleanup) = state.uploads().remove(&stored.filename).await {
                tracing::warn!(error = %cleanup, filename = %stored.filename, "Failed to remove orphaned upload");
            }
            Err(e.into())
        }
    }
}

/// Delete a library entry and its files.
///
/// # Route
///
/// `DELETE /api/media/{id}`
///
/// # Errors
///
/// Returns 404 if the entry does not exist.
pub async fn delete_media(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<MediaId>,
) -> Result<Json<Success>, AppError> {
    let item = MediaRepository::new(state.pool()).delete(id).await?;
    if let Err(e) = state.uploads().remove(&item.filename).await {
        tracing::warn!(error = %e, filename = %item.filename, "Deleted media row but not its file");
    }
    Ok(success())
}
