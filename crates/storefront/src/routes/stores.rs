//! Store listing and service category handlers.
//!
//! Admins manage every store. A user named as a store's owner may edit it,
//! delete it and choose its products, but cannot hand it to someone else.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;

use gerinmah_core::{ProductId, ServiceCategoryId, StoreId};

use crate::db::StoreRepository;
use crate::error::AppError;
use crate::middleware::{OptionalAuth, Principal, RequireAdmin, RequireAuth};
use crate::models::{ServiceCategory, ServiceCategoryInput, Store, StoreInput, StoreWithProducts};
use crate::state::AppState;

use super::{Success, success};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/service-categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/api/service-categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/api/stores", get(list_stores).post(create_store))
        .route(
            "/api/stores/{id}",
            get(show_store).put(update_store).delete(delete_store),
        )
        .route("/api/stores/{id}/products", put(set_store_products))
}

// =============================================================================
// Service categories
// =============================================================================

/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceCategory>>, AppError> {
    Ok(Json(StoreRepository::new(state.pool()).list_categories().await?))
}

/// # Errors
///
/// Returns 400 for invalid fields or a duplicate slug.
pub async fn create_category(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<ServiceCategoryInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    let category = StoreRepository::new(state.pool())
        .create_category(&input)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// # Errors
///
/// Returns 400 for invalid fields and 404 if the category does not exist.
pub async fn update_category(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ServiceCategoryId>,
    Json(body): Json<ServiceCategoryInput>,
) -> Result<Json<ServiceCategory>, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    Ok(Json(
        StoreRepository::new(state.pool())
            .update_category(id, &input)
            .await?,
    ))
}

/// # Errors
///
/// Returns 404 if the category does not exist.
pub async fn delete_category(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ServiceCategoryId>,
) -> Result<Json<Success>, AppError> {
    StoreRepository::new(state.pool())
        .delete_category(id)
        .await?;
    Ok(success())
}

// =============================================================================
// Stores
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StoreQuery {
    pub category: Option<ServiceCategoryId>,
}

/// # Route
///
/// `GET /api/stores[?category=]`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_stores(
    State(state): State<AppState>,
    OptionalAuth(principal): OptionalAuth,
    Query(query): Query<StoreQuery>,
) -> Result<Json<Vec<Store>>, AppError> {
    Ok(Json(
        StoreRepository::new(state.pool())
            .list(query.category, principal.is_admin())
            .await?,
    ))
}

/// A store with its products. Inactive stores are only visible to admins
/// and their owner.
///
/// # Errors
///
/// Returns 404 if the store does not exist or is hidden.
pub async fn show_store(
    State(state): State<AppState>,
    OptionalAuth(principal): OptionalAuth,
    Path(id): Path<StoreId>,
) -> Result<Json<StoreWithProducts>, AppError> {
    StoreRepository::new(state.pool())
        .get_with_products(id)
        .await?
        .filter(|s| s.store.is_active || principal.can_access(s.store.owner_id))
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("store {id}")))
}

/// # Errors
///
/// Returns 400 for invalid fields or an unknown category/owner.
pub async fn create_store(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<StoreInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    let store = StoreRepository::new(state.pool()).create(&input).await?;
    tracing::info!(store_id = %store.id, "Store created");
    Ok((StatusCode::CREATED, Json(store)))
}

/// Check that the principal may change a store.
async fn writable_store(
    repo: &StoreRepository<'_>,
    principal: &Principal,
    id: StoreId,
) -> Result<(), AppError> {
    let store = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("store {id}")))?;
    principal.ensure_access(store.owner_id, "store")
}

/// # Errors
///
/// Returns 404 for an unknown store and 403 for someone else's store.
pub async fn update_store(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(id): Path<StoreId>,
    Json(body): Json<StoreInput>,
) -> Result<Json<Store>, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    let repo = StoreRepository::new(state.pool());
    writable_store(&repo, &principal, id).await?;
    Ok(Json(repo.update(id, &input, !principal.is_admin()).await?))
}

/// # Errors
///
/// Returns 404 for an unknown store and 403 for someone else's store.
pub async fn delete_store(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(id): Path<StoreId>,
) -> Result<Json<Success>, AppError> {
    let repo = StoreRepository::new(state.pool());
    writable_store(&repo, &principal, id).await?;
    repo.delete(id).await?;
    tracing::info!(store_id = %id, "Store deleted");
    Ok(success())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreProducts {
    pub product_ids: Vec<ProductId>,
}

/// Replace the products a store carries.
///
/// # Route
///
/// `PUT /api/stores/{id}/products`
///
/// # Errors
///
/// Returns 403 for someone else's store and 409 for unknown products.
pub async fn set_store_products(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(id): Path<StoreId>,
    Json(body): Json<StoreProducts>,
) -> Result<Json<StoreWithProducts>, AppError> {
    let repo = StoreRepository::new(state.pool());
    writable_store(&repo, &principal, id).await?;

    let mut products = body.product_ids;
    products.sort_unstable();
    products.dedup();
    repo.set_products(id, &products).await?;

    repo.get_with_products(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("store {id}")))
}
