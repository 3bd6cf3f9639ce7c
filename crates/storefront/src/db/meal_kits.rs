//! Meal kit repository: curated kits and customer-built kits.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use gerinmah_core::{GeneratedMealKitId, MealKitId, UserId};

use super::{RepositoryError, map_constraint};
use crate::models::meal_kit::GeneratedMealKitWithComponents;
use crate::models::{
    ComponentInput, GeneratedMealKit, GeneratedMealKitInput, MealKit, MealKitComponent,
    MealKitInput, MealKitWithComponents,
};

const KIT_COLUMNS: &str = "id, name_mn, name_ru, name_en, description_mn, description_ru, \
    description_en, price, image_url, is_active, created_at, updated_at";

pub struct MealKitRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MealKitRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Kits with their components. Inactive kits are hidden unless
    /// `include_inactive` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<MealKitWithComponents>, RepositoryError> {
        let kits = sqlx::query_as::<_, MealKit>(&format!(
            "SELECT {KIT_COLUMNS} FROM meal_kits WHERE $1 OR is_active ORDER BY id"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        let mut out = Vec::with_capacity(kits.len());
        for kit in kits {
            let components = self.components(kit.id).await?;
            out.push(MealKitWithComponents { kit, components });
        }
        Ok(out)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: MealKitId) -> Result<Option<MealKitWithComponents>, RepositoryError> {
        let Some(kit) = sqlx::query_as::<_, MealKit>(&format!(
            "SELECT {KIT_COLUMNS} FROM meal_kits WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };
        let components = self.components(id).await?;
        Ok(Some(MealKitWithComponents { kit, components }))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a component product does not exist.
    pub async fn create(&self, input: &MealKitInput) -> Result<MealKitWithComponents, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let kit = sqlx::query_as::<_, MealKit>(&format!(
            "INSERT INTO meal_kits (name_mn, name_ru, name_en, description_mn, description_ru,
                                    description_en, price, image_url, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {KIT_COLUMNS}"
        ))
        .bind(&input.name_mn)
        .bind(input.name_ru.as_deref())
        .bind(input.name_en.as_deref())
        .bind(input.description_mn.as_deref())
        .bind(input.description_ru.as_deref())
        .bind(input.description_en.as_deref())
        .bind(input.price)
        .bind(input.image_url.as_deref())
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await?;

        insert_components(&mut tx, kit.id, &input.components).await?;
        tx.commit().await?;

        let components = self.components(kit.id).await?;
        Ok(MealKitWithComponents { kit, components })
    }

    /// Replace a kit's fields and components.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the kit does not exist.
    pub async fn update(
        &self,
        id: MealKitId,
        input: &MealKitInput,
    ) -> Result<MealKitWithComponents, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let kit = sqlx::query_as::<_, MealKit>(&format!(
            "UPDATE meal_kits
             SET name_mn = $2, name_ru = $3, name_en = $4, description_mn = $5,
                 description_ru = $6, description_en = $7, price = $8, image_url = $9,
                 is_active = $10, updated_at = NOW()
             WHERE id = $1
             RETURNING {KIT_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.name_mn)
        .bind(input.name_ru.as_deref())
        .bind(input.name_en.as_deref())
        .bind(input.description_mn.as_deref())
        .bind(input.description_ru.as_deref())
        .bind(input.description_en.as_deref())
        .bind(input.price)
        .bind(input.image_url.as_deref())
        .bind(input.is_active)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query("DELETE FROM meal_kit_components WHERE meal_kit_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_components(&mut tx, id, &input.components).await?;
        tx.commit().await?;

        let components = self.components(id).await?;
        Ok(MealKitWithComponents { kit, components })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the kit does not exist.
    pub async fn delete(&self, id: MealKitId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM meal_kits WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Save a customer-built kit, pricing each component from the live
    /// product price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Rejected` if a component product is missing
    /// or inactive.
    pub async fn create_generated(
        &self,
        user: Option<UserId>,
        input: &GeneratedMealKitInput,
    ) -> Result<GeneratedMealKitWithComponents, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut priced = Vec::with_capacity(input.components.len());
        let mut total = Decimal::ZERO;
        for component in &input.components {
            let price: Option<Decimal> =
                sqlx::query_scalar("SELECT price FROM products WHERE id = $1 AND is_active")
                    .bind(component.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let price = price.ok_or_else(|| {
                RepositoryError::Rejected(format!("product {} is unavailable", component.product_id))
            })?;
            total += price * Decimal::from(component.quantity);
            priced.push((component, price));
        }

        let kit = sqlx::query_as::<_, GeneratedMealKit>(
            "INSERT INTO generated_meal_kits (user_id, name, total_price)
             VALUES ($1, $2, $3)
             RETURNING id, user_id, name, total_price, created_at",
        )
        .bind(user)
        .bind(input.name_or_default())
        .bind(total)
        .fetch_one(&mut *tx)
        .await?;

        for (component, price) in priced {
            sqlx::query(
                "INSERT INTO generated_meal_kit_components
                     (generated_meal_kit_id, product_id, quantity, unit_price)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(kit.id)
            .bind(component.product_id)
            .bind(component.quantity)
            .bind(price)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        let components = self.generated_components(kit.id).await?;
        Ok(GeneratedMealKitWithComponents { kit, components })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_generated(
        &self,
        id: GeneratedMealKitId,
    ) -> Result<Option<GeneratedMealKitWithComponents>, RepositoryError> {
        let Some(kit) = sqlx::query_as::<_, GeneratedMealKit>(
            "SELECT id, user_id, name, total_price, created_at FROM generated_meal_kits
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };
        let components = self.generated_components(id).await?;
        Ok(Some(GeneratedMealKitWithComponents { kit, components }))
    }

    async fn components(&self, kit: MealKitId) -> Result<Vec<MealKitComponent>, RepositoryError> {
        let rows = sqlx::query_as::<_, MealKitComponent>(
            "SELECT c.product_id, c.quantity, p.name_mn AS product_name_mn, p.price AS unit_price
             FROM meal_kit_components c
             JOIN products p ON p.id = c.product_id
             WHERE c.meal_kit_id = $1
             ORDER BY c.id",
        )
        .bind(kit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    async fn generated_components(
        &self,
        kit: GeneratedMealKitId,
    ) -> Result<Vec<MealKitComponent>, RepositoryError> {
        let rows = sqlx::query_as::<_, MealKitComponent>(
            "SELECT c.product_id, c.quantity, p.name_mn AS product_name_mn, c.unit_price
             FROM generated_meal_kit_components c
             JOIN products p ON p.id = c.product_id
             WHERE c.generated_meal_kit_id = $1
             ORDER BY c.id",
        )
        .bind(kit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

async fn insert_components(
    tx: &mut Transaction<'_, Postgres>,
    kit: MealKitId,
    components: &[ComponentInput],
) -> Result<(), RepositoryError> {
    for component in components {
        sqlx::query(
            "INSERT INTO meal_kit_components (meal_kit_id, product_id, quantity)
             VALUES ($1, $2, $3)",
        )
        .bind(kit)
        .bind(component.product_id)
        .bind(component.quantity)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_constraint(e, "meal kit component"))?;
    }
    Ok(())
}
