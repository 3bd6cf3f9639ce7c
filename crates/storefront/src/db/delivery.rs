//! Delivery settings and non-delivery days.

use sqlx::PgPool;

use gerinmah_core::NonDeliveryDayId;

use super::{RepositoryError, map_constraint};
use crate::models::{DeliverySettings, DeliverySettingsInput, NonDeliveryDay, NonDeliveryDayInput};

pub struct DeliveryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DeliveryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The singleton settings row (seeded by the migration).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the row is missing.
    pub async fn settings(&self) -> Result<DeliverySettings, RepositoryError> {
        sqlx::query_as::<_, DeliverySettings>(
            "SELECT delivery_fee, free_delivery_threshold, min_order_amount, cutoff_hour, updated_at
             FROM delivery_settings WHERE id = 1",
        )
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::DataCorruption("delivery_settings row missing".to_string()))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save_settings(
        &self,
        input: &DeliverySettingsInput,
    ) -> Result<DeliverySettings, RepositoryError> {
        let row = sqlx::query_as::<_, DeliverySettings>(
            "INSERT INTO delivery_settings (id, delivery_fee, free_delivery_threshold,
                                            min_order_amount, cutoff_hour)
             VALUES (1, $1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE
             SET delivery_fee = EXCLUDED.delivery_fee,
                 free_delivery_threshold = EXCLUDED.free_delivery_threshold,
                 min_order_amount = EXCLUDED.min_order_amount,
                 cutoff_hour = EXCLUDED.cutoff_hour, updated_at = NOW()
             RETURNING delivery_fee, free_delivery_threshold, min_order_amount, cutoff_hour,
                       updated_at",
        )
        .bind(input.delivery_fee)
        .bind(input.free_delivery_threshold)
        .bind(input.min_order_amount)
        .bind(input.cutoff_hour)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Closed days in date order. Past days are skipped unless `include_past`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_days(&self, include_past: bool) -> Result<Vec<NonDeliveryDay>, RepositoryError> {
        let rows = sqlx::query_as::<_, NonDeliveryDay>(
            "SELECT id, day, reason, created_at FROM non_delivery_days
             WHERE $1 OR day >= CURRENT_DATE
             ORDER BY day",
        )
        .bind(include_past)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the day is already closed.
    pub async fn add_day(&self, input: &NonDeliveryDayInput) -> Result<NonDeliveryDay, RepositoryError> {
        sqlx::query_as::<_, NonDeliveryDay>(
            "INSERT INTO non_delivery_days (day, reason) VALUES ($1, $2)
             RETURNING id, day, reason, created_at",
        )
        .bind(input.day)
        .bind(input.reason.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "non-delivery day"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the day does not exist.
    pub async fn delete_day(&self, id: NonDeliveryDayId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM non_delivery_days WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
