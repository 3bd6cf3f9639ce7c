//! Store listing types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gerinmah_core::{ServiceCategoryId, StoreId, UserId};

use super::{Product, non_blank, require};

/// A category of partner stores (butchers, markets...).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCategory {
    pub id: ServiceCategoryId,
    pub slug: String,
    pub name_mn: String,
    pub name_ru: Option<String>,
    pub name_en: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCategoryInput {
    pub slug: String,
    pub name_mn: String,
    pub name_ru: Option<String>,
    pub name_en: Option<String>,
}

impl ServiceCategoryInput {
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.slug = self.slug.trim().to_lowercase();
        self.name_mn = self.name_mn.trim().to_string();
        require(&self.slug, "slug")?;
        require(&self.name_mn, "nameMn")?;
        self.name_ru = non_blank(self.name_ru);
        self.name_en = non_blank(self.name_en);
        Ok(self)
    }
}

/// A store listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub image_url: Option<String>,
    pub category_id: Option<ServiceCategoryId>,
    pub owner_id: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInput {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub image_url: Option<String>,
    pub category_id: Option<ServiceCategoryId>,
    /// Only honoured for admins; owners cannot hand a store to someone else.
    pub owner_id: Option<UserId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl StoreInput {
    /// # Errors
    ///
    /// Returns a message if the name is blank.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.name = self.name.trim().to_string();
        require(&self.name, "name")?;
        self.description = non_blank(self.description);
        self.address = non_blank(self.address);
        self.phone = non_blank(self.phone);
        self.image_url = non_blank(self.image_url);
        Ok(self)
    }
}

/// A store with the products it carries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreWithProducts {
    #[serde(flatten)]
    pub store: Store,
    pub products: Vec<Product>,
}
