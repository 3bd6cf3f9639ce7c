//! Served upload files.
//!
//! A request for a file missing from the served directory copies it back
//! from the permanent store before answering, so a wiped served directory
//! heals on first access instead of waiting for the next reconciliation.

use axum::{
    Router,
    body::Body,
    extract::{Path, Request, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::AppError;
use crate::services::uploads::validate_filename;
use crate::state::AppState;

const UPLOAD_CACHE_CONTROL: &str = "public, max-age=604800";

pub fn router() -> Router<AppState> {
    Router::new().route("/uploads/{name}", get(serve_upload))
}

/// # Route
///
/// `GET /uploads/{name}`
///
/// # Errors
///
/// Returns 404 for unsafe names and files neither directory has.
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request: Request<Body>,
) -> Result<Response, AppError> {
    let not_found = || AppError::NotFound(format!("upload {name}"));
    if validate_filename(&name).is_err() {
        return Err(not_found());
    }

    let path = state
        .uploads()
        .ensure_served(&name)
        .await?
        .ok_or_else(not_found)?;

    let mut response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    };
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(UPLOAD_CACHE_CONTROL),
    );
    Ok(response)
}
