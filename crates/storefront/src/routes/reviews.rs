//! Product review handlers.
//!
//! New reviews wait for moderation; only approved ones are public.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch},
};

use gerinmah_core::{ProductId, ReviewId};

use crate::db::{ReviewRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::{Review, ReviewInput};
use crate::state::AppState;

use super::{Success, success};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/products/{id}/reviews",
            get(list_reviews).post(create_review),
        )
        .route("/api/admin/reviews", get(list_all_reviews))
        .route("/api/reviews/{id}/approve", patch(approve_review))
        .route("/api/reviews/{id}", delete(delete_review))
}

/// Approved reviews for a product, newest first.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(product): Path<ProductId>,
) -> Result<Json<Vec<Review>>, AppError> {
    Ok(Json(
        ReviewRepository::new(state.pool())
            .list_approved(product)
            .await?,
    ))
}

/// Submit a review. The author name is the user's full name, or their
/// username when they have none.
///
/// # Route
///
/// `POST /api/products/{id}/reviews`
///
/// # Errors
///
/// Returns 400 for an invalid rating or comment and 404 for an unknown product.
pub async fn create_review(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product): Path<ProductId>,
    Json(body): Json<ReviewInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;

    let author = UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .and_then(|u| u.full_name)
        .unwrap_or(user.username);

    let review = ReviewRepository::new(state.pool())
        .create(product, user.id, &author, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Every review, for moderation.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_all_reviews(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Review>>, AppError> {
    Ok(Json(ReviewRepository::new(state.pool()).list_all().await?))
}

/// # Errors
///
/// Returns 404 if the review does not exist.
pub async fn approve_review(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ReviewId>,
) -> Result<Json<Review>, AppError> {
    Ok(Json(ReviewRepository::new(state.pool()).approve(id).await?))
}

/// # Errors
///
/// Returns 404 if the review does not exist.
pub async fn delete_review(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ReviewId>,
) -> Result<Json<Success>, AppError> {
    ReviewRepository::new(state.pool()).delete(id).await?;
    Ok(success())
}
