//! Navigation menu repository.

use sqlx::PgPool;

use gerinmah_core::NavigationItemId;

use super::{RepositoryError, map_constraint};
use crate::models::{NavigationInput, NavigationItem, NavigationNode, content::build_navigation_tree};

const NAV_COLUMNS: &str =
    "id, parent_id, label_mn, label_ru, label_en, url, sort_order, is_active, created_at";

pub struct NavigationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NavigationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The menu as a tree. Inactive entries hide their whole subtree unless
    /// `include_inactive` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tree(&self, include_inactive: bool) -> Result<Vec<NavigationNode>, RepositoryError> {
        let rows = sqlx::query_as::<_, NavigationItem>(&format!(
            "WITH RECURSIVE visible AS (
                 SELECT * FROM navigation_items
                 WHERE parent_id IS NULL AND ($1 OR is_active)
                 UNION ALL
                 SELECT n.* FROM navigation_items n
                 JOIN visible v ON n.parent_id = v.id
                 WHERE $1 OR n.is_active
             )
             SELECT {NAV_COLUMNS} FROM visible
             ORDER BY sort_order, id"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;
        Ok(build_navigation_tree(rows))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the parent does not exist.
    pub async fn create(&self, input: &NavigationInput) -> Result<NavigationItem, RepositoryError> {
        sqlx::query_as::<_, NavigationItem>(&format!(
            "INSERT INTO navigation_items (parent_id, label_mn, label_ru, label_en, url, sort_order, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {NAV_COLUMNS}"
        ))
        .bind(input.parent_id)
        .bind(&input.label_mn)
        .bind(input.label_ru.as_deref())
        .bind(input.label_en.as_deref())
        .bind(&input.url)
        .bind(input.sort_order)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "navigation item"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Rejected` if the item would become its own
    /// ancestor and `RepositoryError::NotFound` if it does not exist.
    pub async fn update(
        &self,
        id: NavigationItemId,
        input: &NavigationInput,
    ) -> Result<NavigationItem, RepositoryError> {
        if let Some(parent) = input.parent_id {
            let creates_cycle: bool = sqlx::query_scalar(
                "WITH RECURSIVE ancestors AS (
                     SELECT id, parent_id FROM navigation_items WHERE id = $1
                     UNION
                     SELECT n.id, n.parent_id FROM navigation_items n
                     JOIN ancestors a ON n.id = a.parent_id
                 )
                 SELECT EXISTS (SELECT 1 FROM ancestors WHERE id = $2)",
            )
            .bind(parent)
            .bind(id)
            .fetch_one(self.pool)
            .await?;
            if creates_cycle {
                return Err(RepositoryError::Rejected(
                    "navigation item cannot be nested under itself".to_string(),
                ));
            }
        }

        sqlx::query_as::<_, NavigationItem>(&format!(
            "UPDATE navigation_items
             SET parent_id = $2, label_mn = $3, label_ru = $4, label_en = $5, url = $6,
                 sort_order = $7, is_active = $8
             WHERE id = $1
             RETURNING {NAV_COLUMNS}"
        ))
        .bind(id)
        .bind(input.parent_id)
        .bind(&input.label_mn)
        .bind(input.label_ru.as_deref())
        .bind(input.label_en.as_deref())
        .bind(&input.url)
        .bind(input.sort_order)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_constraint(e, "navigation item"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete an item and, by cascade, its children.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn delete(&self, id: NavigationItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM navigation_items WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
