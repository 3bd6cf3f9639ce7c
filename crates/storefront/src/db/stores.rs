//! Store listings and service categories.

use sqlx::PgPool;

use gerinmah_core::{ProductId, ServiceCategoryId, StoreId};

use super::{RepositoryError, map_constraint};
use crate::models::{
    Product, ServiceCategory, ServiceCategoryInput, Store, StoreInput, StoreWithProducts,
};

const STORE_COLUMNS: &str = "id, name, description, address, phone, image_url, category_id, \
    owner_id, is_active, created_at, updated_at";

const SERVICE_CATEGORY_COLUMNS: &str = "id, slug, name_mn, name_ru, name_en, created_at";

pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Service categories
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<ServiceCategory>, RepositoryError> {
        let rows = sqlx::query_as::<_, ServiceCategory>(&format!(
            "SELECT {SERVICE_CATEGORY_COLUMNS} FROM service_categories ORDER BY name_mn, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create_category(
        &self,
        input: &ServiceCategoryInput,
    ) -> Result<ServiceCategory, RepositoryError> {
        sqlx::query_as::<_, ServiceCategory>(&format!(
            "INSERT INTO service_categories (slug, name_mn, name_ru, name_en)
             VALUES ($1, $2, $3, $4)
             RETURNING {SERVICE_CATEGORY_COLUMNS}"
        ))
        .bind(&input.slug)
        .bind(&input.name_mn)
        .bind(input.name_ru.as_deref())
        .bind(input.name_en.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "service category"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update_category(
        &self,
        id: ServiceCategoryId,
        input: &ServiceCategoryInput,
    ) -> Result<ServiceCategory, RepositoryError> {
        sqlx::query_as::<_, ServiceCategory>(&format!(
            "UPDATE service_categories SET slug = $2, name_mn = $3, name_ru = $4, name_en = $5
             WHERE id = $1
             RETURNING {SERVICE_CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.slug)
        .bind(&input.name_mn)
        .bind(input.name_ru.as_deref())
        .bind(input.name_en.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_constraint(e, "service category"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete_category(&self, id: ServiceCategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM service_categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Stores
    // =========================================================================

    /// Stores, optionally filtered by service category. Inactive stores are
    /// hidden unless `include_inactive` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        category: Option<ServiceCategoryId>,
        include_inactive: bool,
    ) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, Store>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores
             WHERE ($1::INTEGER IS NULL OR category_id = $1) AND ($2 OR is_active)
             ORDER BY name, id"
        ))
        .bind(category)
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, Store>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// A store and the active products it carries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_with_products(
        &self,
        id: StoreId,
    ) -> Result<Option<StoreWithProducts>, RepositoryError> {
        let Some(store) = self.get(id).await? else {
            return Ok(None);
        };
        let products = sqlx::query_as::<_, Product>(
            "SELECT p.* FROM products p
             JOIN store_products sp ON sp.product_id = p.id
             WHERE sp.store_id = $1 AND p.is_active
             ORDER BY p.name_mn, p.id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(Some(StoreWithProducts { store, products }))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the category or owner does not exist.
    pub async fn create(&self, input: &StoreInput) -> Result<Store, RepositoryError> {
        sqlx::query_as::<_, Store>(&format!(
            "INSERT INTO stores (name, description, address, phone, image_url, category_id,
                                 owner_id, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {STORE_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.address.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.image_url.as_deref())
        .bind(input.category_id)
        .bind(input.owner_id)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "store"))
    }

    /// Update a store. The owner is only changed when `keep_owner` is false.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn update(
        &self,
        id: StoreId,
        input: &StoreInput,
        keep_owner: bool,
    ) -> Result<Store, RepositoryError> {
        sqlx::query_as::<_, Store>(&format!(
            "UPDATE stores
             SET name = $2, description = $3, address = $4, phone = $5, image_url = $6,
                 category_id = $7, owner_id = CASE WHEN $9 THEN owner_id ELSE $8 END,
                 is_active = $10, updated_at = NOW()
             WHERE id = $1
             RETURNING {STORE_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.address.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.image_url.as_deref())
        .bind(input.category_id)
        .bind(input.owner_id)
        .bind(keep_owner)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_constraint(e, "store"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn delete(&self, id: StoreId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM stores WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Replace the set of products a store carries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist or
    /// `RepositoryError::Conflict` if a product id is unknown.
    pub async fn set_products(
        &self,
        id: StoreId,
        products: &[ProductId],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM stores WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM store_products WHERE store_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let ids: Vec<i32> = products.iter().map(ProductId::as_i32).collect();
        sqlx::query(
            "INSERT INTO store_products (store_id, product_id)
             SELECT $1, product_id FROM UNNEST($2::INTEGER[]) AS t(product_id)
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "store product"))?;

        tx.commit().await?;
        Ok(())
    }
}
