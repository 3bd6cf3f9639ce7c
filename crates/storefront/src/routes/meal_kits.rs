//! Meal kit handlers: curated kits and customer-built kits.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use gerinmah_core::{GeneratedMealKitId, MealKitId};

use crate::db::MealKitRepository;
use crate::error::AppError;
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::{
    GeneratedMealKitInput, GeneratedMealKitWithComponents, MealKitInput, MealKitWithComponents,
};
use crate::state::AppState;

use super::{Success, success};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/meal-kits", get(list_kits).post(create_kit))
        .route(
            "/api/meal-kits/{id}",
            get(show_kit).put(update_kit).delete(delete_kit),
        )
        .route("/api/generated-meal-kits", post(create_generated))
        .route("/api/generated-meal-kits/{id}", get(show_generated))
}

/// Kits with their components. Admins also see inactive kits.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_kits(
    State(state): State<AppState>,
    OptionalAuth(principal): OptionalAuth,
) -> Result<Json<Vec<MealKitWithComponents>>, AppError> {
    Ok(Json(
        MealKitRepository::new(state.pool())
            .list(principal.is_admin())
            .await?,
    ))
}

/// # Errors
///
/// Returns 404 if the kit does not exist or is inactive (for non-admins).
pub async fn show_kit(
    State(state): State<AppState>,
    OptionalAuth(principal): OptionalAuth,
    Path(id): Path<MealKitId>,
) -> Result<Json<MealKitWithComponents>, AppError> {
    MealKitRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|k| k.kit.is_active || principal.is_admin())
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("meal kit {id}")))
}

/// # Errors
///
/// Returns 400 for invalid fields or no components and 409 for unknown products.
pub async fn create_kit(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<MealKitInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    let kit = MealKitRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(kit)))
}

/// Replace a kit and its component list.
///
/// # Errors
///
/// Returns 400 for invalid fields and 404 if the kit does not exist.
pub async fn update_kit(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<MealKitId>,
    Json(body): Json<MealKitInput>,
) -> Result<Json<MealKitWithComponents>, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    Ok(Json(
        MealKitRepository::new(state.pool())
            .update(id, &input)
            .await?,
    ))
}

/// # Errors
///
/// Returns 404 if the kit does not exist.
pub async fn delete_kit(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<MealKitId>,
) -> Result<Json<Success>, AppError> {
    MealKitRepository::new(state.pool()).delete(id).await?;
    Ok(success())
}

/// Save a kit the customer assembled, priced from current product prices.
///
/// # Route
///
/// `POST /api/generated-meal-kits`
///
/// # Errors
///
/// Returns 400 for no components or an unavailable product.
pub async fn create_generated(
    State(state): State<AppState>,
    OptionalAuth(principal): OptionalAuth,
    Json(body): Json<GeneratedMealKitInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    let kit = MealKitRepository::new(state.pool())
        .create_generated(principal.user_id(), &input)
        .await?;
    Ok((StatusCode::CREATED, Json(kit)))
}

/// A saved kit. Kits built while logged in are private to their owner
/// (and admins); guest kits are readable by id.
///
/// # Errors
///
/// Returns 404 for an unknown kit and 401/403 for someone else's kit.
pub async fn show_generated(
    State(state): State<AppState>,
    OptionalAuth(principal): OptionalAuth,
    Path(id): Path<GeneratedMealKitId>,
) -> Result<Json<GeneratedMealKitWithComponents>, AppError> {
    let kit = MealKitRepository::new(state.pool())
        .get_generated(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("generated meal kit {id}")))?;
    if kit.kit.user_id.is_some() {
        principal.ensure_access(kit.kit.user_id, "generated meal kit")?;
    }
    Ok(Json(kit))
}
