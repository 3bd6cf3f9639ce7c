//! CMS handlers: site content, settings, footer and navigation.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use serde_json::Value;

use gerinmah_core::{NavigationItemId, SiteContentId};

use crate::db::{ContentRepository, NavigationRepository};
use crate::error::AppError;
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::content::{HERO_IMAGE_SETTING, LOGO_SETTING, settings_map};
use crate::models::{
    FooterSettings, FooterSettingsInput, NavigationInput, NavigationItem, NavigationNode,
    SiteContent, SiteContentInput, SiteSetting,
};
use crate::state::AppState;

use super::{Success, UploadForm, success, upload_limit};

/// Longest accepted setting key.
const MAX_SETTING_KEY_LEN: usize = 64;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/content", get(list_content).put(upsert_content))
        .route("/api/content/{id}", delete(delete_content))
        .route("/api/settings", get(list_settings))
        .route("/api/settings/{key}", put(set_setting))
        .route("/api/settings/hero", post(upload_hero).layer(upload_limit()))
        .route("/api/settings/logo", post(upload_logo).layer(upload_limit()))
        .route("/api/footer", get(footer).put(save_footer))
        .route("/api/navigation", get(navigation).post(create_navigation))
        .route(
            "/api/navigation/{id}",
            put(update_navigation).delete(delete_navigation),
        )
}

// =============================================================================
// Site content
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ContentQuery {
    pub section: Option<String>,
}

/// # Route
///
/// `GET /api/content[?section=]`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_content(
    State(state): State<AppState>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<Vec<SiteContent>>, AppError> {
    let section = query.section.as_deref().map(str::trim).filter(|s| !s.is_empty());
    Ok(Json(ContentRepository::new(state.pool()).list(section).await?))
}

/// Create or replace the block at `(section, key)`.
///
/// # Route
///
/// `PUT /api/content`
///
/// # Errors
///
/// Returns 400 if `section` or `key` is blank.
pub async fn upsert_content(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<SiteContentInput>,
) -> Result<Json<SiteContent>, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    Ok(Json(ContentRepository::new(state.pool()).upsert(&input).await?))
}

/// # Errors
///
/// Returns 404 if the block does not exist.
pub async fn delete_content(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<SiteContentId>,
) -> Result<Json<Success>, AppError> {
    ContentRepository::new(state.pool()).delete(id).await?;
    Ok(success())
}

// =============================================================================
// Settings
// =============================================================================

/// All settings as a `key -> value` object.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_settings(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, Value>>, AppError> {
    let rows = ContentRepository::new(state.pool()).list_settings().await?;
    Ok(Json(settings_map(rows)))
}

#[derive(Debug, Deserialize)]
pub struct SettingUpdate {
    pub value: Value,
}

/// Setting keys are short lowercase identifiers.
fn valid_setting_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_SETTING_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'))
}

/// # Route
///
/// `PUT /api/settings/{key}`
///
/// # Errors
///
/// Returns 400 for a malformed key.
pub async fn set_setting(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(key): Path<String>,
    Json(body): Json<SettingUpdate>,
) -> Result<Json<SiteSetting>, AppError> {
    if !valid_setting_key(&key) {
        return Err(AppError::BadRequest(format!("invalid setting key {key:?}")));
    }
    Ok(Json(
        ContentRepository::new(state.pool())
            .set_setting(&key, &body.value)
            .await?,
    ))
}

/// Store an uploaded image and point a setting at its URL.
async fn upload_setting_image(
    state: &AppState,
    key: &str,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SiteSetting>), AppError> {
    let file = UploadForm::read(multipart).await?.require_file()?;
    let stored = state
        .uploads()
        .save(&file.original_name, &file.bytes)
        .await?;
    let updated = ContentRepository::new(state.pool())
        .set_setting(key, &Value::String(stored.url.clone()))
        .await;

    match updated {
        Ok(setting) => {
            tracing::info!(setting = key, filename = %stored.filename, "Setting image replaced");
            Ok((StatusCode::CREATED, Json(setting)))
        }
        Err(e) => {
            discard_upload(state, &stored.filename).await;
            Err(e.into())
        }
    }
}

/// Remove a stored upload whose database write failed.
async fn discard_upload(state: &AppState, filename: &str) {
    if let Err(cleanup) = state.uploads().remove(filename).await {
        tracing::warn!(error = %cleanup, filename = %filename, "Failed to remove orphaned upload");
    }
}

/// # Route
///
/// `POST /api/settings/hero`
///
/// # Errors
///
/// Returns 400 or 413 if the image is rejected.
pub async fn upload_hero(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    upload_setting_image(&state, HERO_IMAGE_SETTING, multipart).await
}

/// # Route
///
/// `POST /api/settings/logo`
///
/// # Errors
///
/// Returns 400 or 413 if the image is rejected.
pub async fn upload_logo(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    upload_setting_image(&state, LOGO_SETTING, multipart).await
}

// =============================================================================
// Footer
// =============================================================================

/// The footer, or `null` before it is first saved.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn footer(
    State(state): State<AppState>,
) -> Result<Json<Option<FooterSettings>>, AppError> {
    Ok(Json(ContentRepository::new(state.pool()).footer().await?))
}

/// # Errors
///
/// Returns 500 if the write fails.
pub async fn save_footer(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<FooterSettingsInput>,
) -> Result<Json<FooterSettings>, AppError> {
    Ok(Json(
        ContentRepository::new(state.pool())
            .save_footer(&body.normalize())
            .await?,
    ))
}

// =============================================================================
// Navigation
// =============================================================================

/// The menu tree. Admins also see hidden entries.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn navigation(
    State(state): State<AppState>,
    OptionalAuth(principal): OptionalAuth,
) -> Result<Json<Vec<NavigationNode>>, AppError> {
    Ok(Json(
        NavigationRepository::new(state.pool())
            .tree(principal.is_admin())
            .await?,
    ))
}

/// # Errors
///
/// Returns 400 for invalid fields or an unknown parent.
pub async fn create_navigation(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<NavigationInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    let item = NavigationRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// # Errors
///
/// Returns 400 for invalid fields or a parent that would form a cycle.
pub async fn update_navigation(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<NavigationItemId>,
    Json(body): Json<NavigationInput>,
) -> Result<Json<NavigationItem>, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    Ok(Json(
        NavigationRepository::new(state.pool())
            .update(id, &input)
            .await?,
    ))
}

/// Delete an entry together with its children.
///
/// # Errors
///
/// Returns 404 if the entry does not exist.
pub async fn delete_navigation(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<NavigationItemId>,
) -> Result<Json<Success>, AppError> {
    NavigationRepository::new(state.pool()).delete(id).await?;
    Ok(success())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{Request, header};
    use sqlx::postgres::PgPoolOptions;

    use crate::config::StorefrontConfig;

    use super::*;

    const BOUNDARY: &str = "gerinmah-boundary";

    async fn image_form(filename: &str) -> Multipart {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    async fn file_count(dir: &std::path::Path) -> usize {
        let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
            return 0;
        };
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_setting_image_removed_when_setting_write_fails() {
        let root = tempfile::tempdir().unwrap();
        let config = StorefrontConfig::for_tests(root.path());
        // Nothing listens on port 1, so the settings write fails
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(500))
            .connect_lazy("postgres://127.0.0.1:1/unused")
            .unwrap();
        let state = AppState::new(config.clone(), pool).unwrap();

        let result = upload_setting_image(&state, HERO_IMAGE_SETTING, image_form("hero.png").await).await;
        assert!(result.is_err());

        assert_eq!(file_count(&config.storage.permanent_upload_dir).await, 0);
        assert_eq!(file_count(&config.storage.public_upload_dir).await, 0);
    }

    #[test]
    fn test_setting_keys() {
        assert!(valid_setting_key("hero_image"));
        assert!(valid_setting_key("contact.phone"));
        assert!(!valid_setting_key(""));
        assert!(!valid_setting_key("Hero"));
        assert!(!valid_setting_key("a/b"));
        assert!(!valid_setting_key(&"k".repeat(MAX_SETTING_KEY_LEN + 1)));
    }
}
