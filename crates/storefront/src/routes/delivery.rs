//! Delivery calendar handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use serde::Deserialize;

use gerinmah_core::NonDeliveryDayId;

use crate::db::DeliveryRepository;
use crate::error::AppError;
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::{DeliverySettings, DeliverySettingsInput, NonDeliveryDay, NonDeliveryDayInput};
use crate::state::AppState;

use super::{Success, success};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/delivery-settings",
            get(settings).put(save_settings),
        )
        .route("/api/non-delivery-days", get(list_days).post(add_day))
        .route("/api/non-delivery-days/{id}", delete(delete_day))
}

/// # Errors
///
/// Returns 500 if the settings row is missing.
pub async fn settings(State(state): State<AppState>) -> Result<Json<DeliverySettings>, AppError> {
    Ok(Json(DeliveryRepository::new(state.pool()).settings().await?))
}

/// # Errors
///
/// Returns 400 for negative amounts or a cutoff outside 0-23.
pub async fn save_settings(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<DeliverySettingsInput>,
) -> Result<Json<DeliverySettings>, AppError> {
    body.validate().map_err(AppError::BadRequest)?;
    Ok(Json(
        DeliveryRepository::new(state.pool())
            .save_settings(&body)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaysQuery {
    #[serde(default)]
    pub include_past: bool,
}

/// Upcoming closed days. Admins may ask for past ones with `?includePast=true`.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_days(
    State(state): State<AppState>,
    OptionalAuth(principal): OptionalAuth,
    Query(query): Query<DaysQuery>,
) -> Result<Json<Vec<NonDeliveryDay>>, AppError> {
    let include_past = query.include_past && principal.is_admin();
    Ok(Json(
        DeliveryRepository::new(state.pool())
            .list_days(include_past)
            .await?,
    ))
}

/// # Errors
///
/// Returns 409 if the day is already closed.
pub async fn add_day(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<NonDeliveryDayInput>,
) -> Result<impl IntoResponse, AppError> {
    let day = DeliveryRepository::new(state.pool())
        .add_day(&body.normalize())
        .await?;
    Ok((StatusCode::CREATED, Json(day)))
}

/// # Errors
///
/// Returns 404 if the day does not exist.
pub async fn delete_day(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<NonDeliveryDayId>,
) -> Result<Json<Success>, AppError> {
    DeliveryRepository::new(state.pool()).delete_day(id).await?;
    Ok(success())
}
