//! Catalog types: categories and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gerinmah_core::{CategoryId, Lang, ProductId};

use super::{non_blank, require};

/// A product category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub slug: String,
    pub name_mn: String,
    pub name_ru: Option<String>,
    pub name_en: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Create/update payload for a category.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub slug: String,
    pub name_mn: String,
    pub name_ru: Option<String>,
    pub name_en: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl CategoryInput {
    /// Trim fields and check required values.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.slug = self.slug.trim().to_lowercase();
        self.name_mn = self.name_mn.trim().to_string();
        require(&self.slug, "slug")?;
        require(&self.name_mn, "name_mn")?;
        if !self
            .slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err("slug may only contain letters, digits and '-'".to_string());
        }
        self.name_ru = non_blank(self.name_ru);
        self.name_en = non_blank(self.name_en);
        Ok(self)
    }
}

/// A product row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name_mn: String,
    pub name_ru: Option<String>,
    pub name_en: Option<String>,
    pub description_mn: Option<String>,
    pub description_ru: Option<String>,
    pub description_en: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub unit: String,
    pub image_url: Option<String>,
    pub category_id: Option<CategoryId>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Display name in the given language.
    #[must_use]
    pub fn name(&self, lang: Lang) -> &str {
        lang.pick(&self.name_mn, self.name_ru.as_deref(), self.name_en.as_deref())
    }
}

/// Create/update payload for a product.
///
/// Also built from multipart form fields on upload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name_mn: String,
    pub name_ru: Option<String>,
    pub name_en: Option<String>,
    pub description_mn: Option<String>,
    pub description_ru: Option<String>,
    pub description_en: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub unit: Option<String>,
    pub image_url: Option<String>,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Trim fields and check required values and ranges.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.name_mn = self.name_mn.trim().to_string();
        require(&self.name_mn, "name_mn")?;
        if self.price.is_sign_negative() {
            return Err("price must not be negative".to_string());
        }
        if self.stock < 0 {
            return Err("stock must not be negative".to_string());
        }
        self.name_ru = non_blank(self.name_ru);
        self.name_en = non_blank(self.name_en);
        self.description_mn = non_blank(self.description_mn);
        self.description_ru = non_blank(self.description_ru);
        self.description_en = non_blank(self.description_en);
        self.unit = non_blank(self.unit);
        self.image_url = non_blank(self.image_url);
        self.price = self.price.round_dp(2);
        Ok(self)
    }

    /// Unit of sale, defaulting to kilograms.
    #[must_use]
    pub fn unit_or_default(&self) -> &str {
        self.unit.as_deref().unwrap_or("kg")
    }
}

/// Query filter for product listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductFilter {
    pub category: Option<CategoryId>,
    pub featured: Option<bool>,
    /// Admins see inactive products too.
    pub include_inactive: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product_input() -> ProductInput {
        ProductInput {
            name_mn: " Үхрийн цул мах ".to_string(),
            price: Decimal::new(2_500_050, 2),
            stock: 10,
            is_active: true,
            ..ProductInput::default()
        }
    }

    #[test]
    fn test_product_input_normalize() {
        let input = ProductInput {
            name_ru: Some("  ".to_string()),
            ..product_input()
        }
        .normalize()
        .unwrap();
        assert_eq!(input.name_mn, "Үхрийн цул мах");
        assert_eq!(input.name_ru, None);
        assert_eq!(input.unit_or_default(), "kg");
    }

    #[test]
    fn test_product_input_rejects_negative_values() {
        let negative_price = ProductInput {
            price: Decimal::new(-1, 0),
            ..product_input()
        };
        assert!(negative_price.normalize().is_err());

        let negative_stock = ProductInput {
            stock: -3,
            ..product_input()
        };
        assert!(negative_stock.normalize().is_err());
    }

    #[test]
    fn test_product_input_deserializes_camel_case() {
        let input: ProductInput = serde_json::from_str(
            r#"{"nameMn":"Хонины мах","price":"18000","categoryId":2,"isFeatured":true}"#,
        )
        .unwrap();
        assert_eq!(input.category_id, Some(CategoryId::new(2)));
        assert!(input.is_featured);
        assert!(input.is_active);
        assert_eq!(input.stock, 0);
    }

    #[test]
    fn test_category_input_normalize() {
        let input = CategoryInput {
            slug: " Beef ".to_string(),
            name_mn: "Үхрийн мах".to_string(),
            name_ru: None,
            name_en: Some(String::new()),
            sort_order: 1,
        }
        .normalize()
        .unwrap();
        assert_eq!(input.slug, "beef");
        assert_eq!(input.name_en, None);

        let bad = CategoryInput {
            slug: "beef/lamb".to_string(),
            name_mn: "мах".to_string(),
            name_ru: None,
            name_en: None,
            sort_order: 0,
        };
        assert!(bad.normalize().is_err());
    }
}
