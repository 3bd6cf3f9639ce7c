//! Product and category handlers.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, put},
};
use rust_decimal::Decimal;
use serde::Deserialize;

use gerinmah_core::{CategoryId, ProductId};

use crate::db::{CategoryRepository, ProductRepository};
use crate::error::AppError;
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::{Category, CategoryInput, Product, ProductFilter, ProductInput};
use crate::state::AppState;

use super::{Success, UploadForm, success, upload_limit};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/products",
            get(list_products).post(create_product).layer(upload_limit()),
        )
        .route(
            "/api/products/{id}",
            get(show_product).put(update_product).delete(delete_product),
        )
        .route("/api/products/{id}/stock", patch(set_stock))
        .route("/api/categories", get(list_categories).post(create_category))
        .route(
            "/api/categories/{id}",
            put(update_category).delete(delete_category),
        )
}

// =============================================================================
// Products
// =============================================================================

/// Product listing filters.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category: Option<CategoryId>,
    pub featured: Option<bool>,
}

/// List products. Admins also see inactive ones.
///
/// # Route
///
/// `GET /api/products[?category=&featured=]`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_products(
    State(state): State<AppState>,
    OptionalAuth(principal): OptionalAuth,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let filter = ProductFilter {
        category: query.category,
        featured: query.featured,
        include_inactive: principal.is_admin(),
    };
    Ok(Json(ProductRepository::new(state.pool()).list(filter).await?))
}

/// # Route
///
/// `GET /api/products/{id}`
///
/// # Errors
///
/// Returns 404 if the product does not exist or is inactive (for non-admins).
pub async fn show_product(
    State(state): State<AppState>,
    OptionalAuth(principal): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|p| p.is_active || principal.is_admin())
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Build a product from multipart fields (camelCase names, as in JSON).
fn product_input_from_form(form: &UploadForm) -> Result<ProductInput, AppError> {
    let price = form
        .parse::<Decimal>("price")?
        .ok_or_else(|| AppError::BadRequest("price is required".to_string()))?;
    let owned = |name: &str| form.field(name).map(str::to_string);

    Ok(ProductInput {
        name_mn: owned("nameMn").unwrap_or_default(),
        name_ru: owned("nameRu"),
        name_en: owned("nameEn"),
        description_mn: owned("descriptionMn"),
        description_ru: owned("descriptionRu"),
        description_en: owned("descriptionEn"),
        price,
        stock: form.parse("stock")?.unwrap_or(0),
        unit: owned("unit"),
        image_url: owned("imageUrl"),
        category_id: form.parse::<i32>("categoryId")?.map(CategoryId::new),
        is_featured: form.flag("isFeatured").unwrap_or(false),
        is_active: form.flag("isActive").unwrap_or(true),
    })
}

/// Create a product from a multipart form with an optional `image` file.
///
/// # Route
///
/// `POST /api/products`
///
/// # Errors
///
/// Returns 400 for invalid fields or a rejected image.
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = UploadForm::read(multipart).await?;
    let mut input = product_input_from_form(&form)?
        .normalize()
        .map_err(AppError::BadRequest)?;

    let stored = match &form.file {
        Some(file) => Some(
            state
                .uploads()
                .save(&file.original_name, &file.bytes)
                .await?,
        ),
        None => None,
    };
    if let Some(stored) = &stored {
        input.image_url = Some(stored.url.clone());
    }

    match ProductRepository::new(state.pool()).create(&input).await {
        Ok(product) => {
            tracing::info!(product_id = %product.id, "Product created");
            Ok((StatusCode::CREATED, Json(product)))
        }
        Err(e) => {
            if let Some(stored) = stored
                && let Err(cleanup) = state.uploads().remove(&stored.filename).await
            {
                tracing::warn!(error = %cleanup, filename = %stored.filename, "Failed to remove orphaned upload");
            }
            Err(e.into())
        }
    }
}

/// # Route
///
/// `PUT /api/products/{id}`
///
/// # Errors
///
/// Returns 400 for invalid fields and 404 if the product does not exist.
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductInput>,
) -> Result<Json<Product>, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    Ok(Json(ProductRepository::new(state.pool()).update(id, &input).await?))
}

/// # Route
///
/// `DELETE /api/products/{id}`
///
/// # Errors
///
/// Returns 404 if the product does not exist and 409 if orders reference it.
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Success>, AppError> {
    ProductRepository::new(state.pool()).delete(id).await?;
    tracing::info!(product_id = %id, "Product deleted");
    Ok(success())
}

#[derive(Debug, Deserialize)]
pub struct StockUpdate {
    pub stock: i32,
}

/// Set a product's stock level.
///
/// # Route
///
/// `PATCH /api/products/{id}/stock`
///
/// # Errors
///
/// Returns 400 for a negative stock and 404 if the product does not exist.
pub async fn set_stock(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<StockUpdate>,
) -> Result<Json<Product>, AppError> {
    if body.stock < 0 {
        return Err(AppError::BadRequest("stock must not be negative".to_string()));
    }
    Ok(Json(
        ProductRepository::new(state.pool())
            .set_stock(id, body.stock)
            .await?,
    ))
}

// =============================================================================
// Categories
// =============================================================================

/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(CategoryRepository::new(state.pool()).list().await?))
}

/// # Errors
///
/// Returns 400 for invalid fields or a duplicate slug.
pub async fn create_category(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<CategoryInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    let category = CategoryRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// # Errors
///
/// Returns 400 for invalid fields and 404 if the category does not exist.
pub async fn update_category(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryInput>,
) -> Result<Json<Category>, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    Ok(Json(
        CategoryRepository::new(state.pool())
            .update(id, &input)
            .await?,
    ))
}

/// Delete a category. Its products keep existing without one.
///
/// # Errors
///
/// Returns 404 if the category does not exist.
pub async fn delete_category(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<Json<Success>, AppError> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    Ok(success())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_form_fields() {
        let form = UploadForm::with_fields(&[
            ("nameMn", "Үхрийн мах"),
            ("price", "18500.50"),
            ("stock", "40"),
            ("categoryId", "3"),
            ("isFeatured", "on"),
        ]);
        let input = product_input_from_form(&form).unwrap().normalize().unwrap();
        assert_eq!(input.name_mn, "Үхрийн мах");
        assert_eq!(input.price, Decimal::new(1_850_050, 2));
        assert_eq!(input.stock, 40);
        assert_eq!(input.category_id, Some(CategoryId::new(3)));
        assert!(input.is_featured);
        assert!(input.is_active);
        assert_eq!(input.unit_or_default(), "kg");
    }

    #[test]
    fn test_product_form_requires_price() {
        let form = UploadForm::with_fields(&[("nameMn", "Хонины мах")]);
        assert!(matches!(
            product_input_from_form(&form),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_product_form_rejects_bad_numbers() {
        let form = UploadForm::with_fields(&[("nameMn", "Хонины мах"), ("price", "1000"), ("stock", "many")]);
        assert!(product_input_from_form(&form).is_err());
    }
}
