//! Meal kit types: curated kits and customer-built kits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gerinmah_core::{GeneratedMealKitId, MealKitId, ProductId, UserId};

use super::{non_blank, order::OrderLine, order::merge_lines, require};

/// A curated meal kit.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MealKit {
    pub id: MealKitId,
    pub name_mn: String,
    pub name_ru: Option<String>,
    pub name_en: Option<String>,
    pub description_mn: Option<String>,
    pub description_ru: Option<String>,
    pub description_en: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product inside a kit, with the product's current name and price.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MealKitComponent {
    pub product_id: ProductId,
    pub quantity: i32,
    pub product_name_mn: String,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealKitWithComponents {
    #[serde(flatten)]
    pub kit: MealKit,
    pub components: Vec<MealKitComponent>,
}

/// A component reference in a create/update payload.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInput {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl From<ComponentInput> for OrderLine {
    fn from(c: ComponentInput) -> Self {
        Self {
            product_id: c.product_id,
            quantity: c.quantity,
        }
    }
}

/// Merge duplicate components the same way checkout merges order lines.
fn merge_components(components: &[ComponentInput]) -> Result<Vec<ComponentInput>, String> {
    let lines: Vec<OrderLine> = components.iter().copied().map(Into::into).collect();
    Ok(merge_lines(&lines)
        .map_err(|e| e.replace("order has no items", "kit has no components"))?
        .into_iter()
        .map(|l| ComponentInput {
            product_id: l.product_id,
            quantity: l.quantity,
        })
        .collect())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealKitInput {
    pub name_mn: String,
    pub name_ru: Option<String>,
    pub name_en: Option<String>,
    pub description_mn: Option<String>,
    pub description_ru: Option<String>,
    pub description_en: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub components: Vec<ComponentInput>,
}

const fn default_true() -> bool {
    true
}

impl MealKitInput {
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.name_mn = self.name_mn.trim().to_string();
        require(&self.name_mn, "nameMn")?;
        if self.price.is_sign_negative() {
            return Err("price must not be negative".to_string());
        }
        self.name_ru = non_blank(self.name_ru);
        self.name_en = non_blank(self.name_en);
        self.description_mn = non_blank(self.description_mn);
        self.description_ru = non_blank(self.description_ru);
        self.description_en = non_blank(self.description_en);
        self.image_url = non_blank(self.image_url);
        self.components = merge_components(&self.components)?;
        Ok(self)
    }
}

/// A kit a customer assembled. Prices are frozen at creation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMealKit {
    pub id: GeneratedMealKitId,
    pub user_id: Option<UserId>,
    pub name: String,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMealKitWithComponents {
    #[serde(flatten)]
    pub kit: GeneratedMealKit,
    pub components: Vec<MealKitComponent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMealKitInput {
    pub name: Option<String>,
    pub components: Vec<ComponentInput>,
}

impl GeneratedMealKitInput {
    /// # Errors
    ///
    /// Returns a message if there are no valid components.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.name = non_blank(self.name);
        self.components = merge_components(&self.components)?;
        Ok(self)
    }

    #[must_use]
    pub fn name_or_default(&self) -> &str {
        self.name.as_deref().unwrap_or("Миний багц")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_kit_merges_components() {
        let input: GeneratedMealKitInput = serde_json::from_str(
            r#"{"components":[{"productId":4,"quantity":1},{"productId":4,"quantity":1},{"productId":1,"quantity":2}]}"#,
        )
        .unwrap();
        let input = input.normalize().unwrap();
        let pairs: Vec<_> = input
            .components
            .iter()
            .map(|c| (c.product_id.as_i32(), c.quantity))
            .collect();
        assert_eq!(pairs, [(1, 2), (4, 2)]);
        assert_eq!(input.name_or_default(), "Миний багц");
    }

    #[test]
    fn test_kit_without_components_is_rejected() {
        let input: GeneratedMealKitInput =
            serde_json::from_str(r#"{"name":"x","components":[]}"#).unwrap();
        assert_eq!(input.normalize().unwrap_err(), "kit has no components");
    }
}
