//! Product repository.

use sqlx::PgPool;

use gerinmah_core::ProductId;

use super::{RepositoryError, map_constraint};
use crate::models::{Product, ProductFilter, ProductInput};

const PRODUCT_COLUMNS: &str = "id, name_mn, name_ru, name_en, description_mn, \
    description_ru, description_en, price, stock, unit, image_url, category_id, is_featured, \
    is_active, created_at, updated_at";

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching the filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE ($1::INTEGER IS NULL OR category_id = $1)
               AND ($2::BOOLEAN IS NULL OR is_featured = $2)
               AND ($3 OR is_active)
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(filter.category)
        .bind(filter.featured)
        .bind(filter.include_inactive)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the category does not exist.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (name_mn, name_ru, name_en, description_mn, description_ru,
                                   description_en, price, stock, unit, image_url, category_id,
                                   is_featured, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&input.name_mn)
        .bind(input.name_ru.as_deref())
        .bind(input.name_en.as_deref())
        .bind(input.description_mn.as_deref())
        .bind(input.description_ru.as_deref())
        .bind(input.description_en.as_deref())
        .bind(input.price)
        .bind(input.stock)
        .bind(input.unit_or_default())
        .bind(input.image_url.as_deref())
        .bind(input.category_id)
        .bind(input.is_featured)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "product"))
    }

    /// Replace every editable field of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            "UPDATE products
             SET name_mn = $2, name_ru = $3, name_en = $4, description_mn = $5,
                 description_ru = $6, description_en = $7, price = $8, stock = $9, unit = $10,
                 image_url = COALESCE($11, image_url), category_id = $12, is_featured = $13,
                 is_active = $14, updated_at = NOW()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.name_mn)
        .bind(input.name_ru.as_deref())
        .bind(input.name_en.as_deref())
        .bind(input.description_mn.as_deref())
        .bind(input.description_ru.as_deref())
        .bind(input.description_en.as_deref())
        .bind(input.price)
        .bind(input.stock)
        .bind(input.unit_or_default())
        .bind(input.image_url.as_deref())
        .bind(input.category_id)
        .bind(input.is_featured)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_constraint(e, "product"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Set the stock level directly.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Rejected` for negative stock and
    /// `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_stock(&self, id: ProductId, stock: i32) -> Result<Product, RepositoryError> {
        if stock < 0 {
            return Err(RepositoryError::Rejected("stock must not be negative".to_string()));
        }
        sqlx::query_as::<_, Product>(&format!(
            "UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(stock)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a product.
    ///
    /// Products referenced by orders cannot be deleted; deactivate them instead.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist, or
    /// `RepositoryError::Conflict` if order lines still reference it.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| map_constraint(e, "product"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
