//! Category repository.

use sqlx::PgPool;

use gerinmah_core::CategoryId;

use super::{RepositoryError, map_constraint};
use crate::models::{Category, CategoryInput};

/// Repository for product categories.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List categories by `sort_order`, then id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, slug, name_mn, name_ru, name_en, sort_order, created_at
             FROM categories ORDER BY sort_order, id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (slug, name_mn, name_ru, name_en, sort_order)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, slug, name_mn, name_ru, name_en, sort_order, created_at",
        )
        .bind(&input.slug)
        .bind(&input.name_mn)
        .bind(input.name_ru.as_deref())
        .bind(input.name_en.as_deref())
        .bind(input.sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "category"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist or
    /// `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories
             SET slug = $2, name_mn = $3, name_ru = $4, name_en = $5, sort_order = $6
             WHERE id = $1
             RETURNING id, slug, name_mn, name_ru, name_en, sort_order, created_at",
        )
        .bind(id)
        .bind(&input.slug)
        .bind(&input.name_mn)
        .bind(input.name_ru.as_deref())
        .bind(input.name_en.as_deref())
        .bind(input.sort_order)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_constraint(e, "category"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a category. Its products become uncategorized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
