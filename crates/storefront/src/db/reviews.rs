//! Product review repository.

use sqlx::PgPool;

use gerinmah_core::{ProductId, ReviewId, UserId};

use super::{RepositoryError, map_constraint};
use crate::models::{Review, ReviewInput};

const REVIEW_COLUMNS: &str =
    "id, product_id, user_id, author_name, rating, comment, is_approved, created_at";

pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Approved reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_approved(&self, product: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews
             WHERE product_id = $1 AND is_approved
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(product)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Every review, unapproved first, for moderation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews ORDER BY is_approved, created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Submit a review. It stays hidden until approved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn create(
        &self,
        product: ProductId,
        user: UserId,
        author_name: &str,
        input: &ReviewInput,
    ) -> Result<Review, RepositoryError> {
        sqlx::query_as::<_, Review>(&format!(
            "INSERT INTO reviews (product_id, user_id, author_name, rating, comment)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(product)
        .bind(user)
        .bind(author_name)
        .bind(input.rating)
        .bind(input.comment.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| match map_constraint(e, "review") {
            RepositoryError::Conflict(_) => RepositoryError::NotFound,
            other => other,
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn approve(&self, id: ReviewId) -> Result<Review, RepositoryError> {
        sqlx::query_as::<_, Review>(&format!(
            "UPDATE reviews SET is_approved = TRUE WHERE id = $1 RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
