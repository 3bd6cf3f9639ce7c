//! CMS types: site content, settings, footer, navigation, media, bank accounts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gerinmah_core::{BankAccountId, MediaId, NavigationItemId, SiteContentId};

use super::{non_blank, require};

/// A translatable text block, addressed by `(section, key)`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SiteContent {
    pub id: SiteContentId,
    pub section: String,
    pub key: String,
    pub value_mn: String,
    pub value_ru: Option<String>,
    pub value_en: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert payload for a content block.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteContentInput {
    pub section: String,
    pub key: String,
    #[serde(default)]
    pub value_mn: String,
    pub value_ru: Option<String>,
    pub value_en: Option<String>,
}

impl SiteContentInput {
    /// # Errors
    ///
    /// Returns a message if `section` or `key` is blank.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.section = self.section.trim().to_string();
        self.key = self.key.trim().to_string();
        require(&self.section, "section")?;
        require(&self.key, "key")?;
        self.value_ru = non_blank(self.value_ru);
        self.value_en = non_blank(self.value_en);
        Ok(self)
    }
}

/// A keyed JSON setting (hero image, logo, contact info...).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SiteSetting {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Setting key holding the hero image URL.
pub const HERO_IMAGE_SETTING: &str = "hero_image";
/// Setting key holding the logo URL.
pub const LOGO_SETTING: &str = "logo";

/// Collapse settings rows into a `key -> value` map.
#[must_use]
pub fn settings_map(rows: Vec<SiteSetting>) -> HashMap<String, serde_json::Value> {
    rows.into_iter().map(|s| (s.key, s.value)).collect()
}

/// Singleton footer row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FooterSettings {
    pub about_mn: String,
    pub about_ru: Option<String>,
    pub about_en: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub copyright: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FooterSettingsInput {
    #[serde(default)]
    pub about_mn: String,
    pub about_ru: Option<String>,
    pub about_en: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub copyright: Option<String>,
}

impl FooterSettingsInput {
    #[must_use]
    pub fn normalize(self) -> Self {
        Self {
            about_mn: self.about_mn.trim().to_string(),
            about_ru: non_blank(self.about_ru),
            about_en: non_blank(self.about_en),
            phone: non_blank(self.phone),
            email: non_blank(self.email),
            address: non_blank(self.address),
            facebook_url: non_blank(self.facebook_url),
            instagram_url: non_blank(self.instagram_url),
            copyright: non_blank(self.copyright),
        }
    }
}

/// A navigation menu entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NavigationItem {
    pub id: NavigationItemId,
    pub parent_id: Option<NavigationItemId>,
    pub label_mn: String,
    pub label_ru: Option<String>,
    pub label_en: Option<String>,
    pub url: String,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationInput {
    pub parent_id: Option<NavigationItemId>,
    pub label_mn: String,
    pub label_ru: Option<String>,
    pub label_en: Option<String>,
    pub url: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl NavigationInput {
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.label_mn = self.label_mn.trim().to_string();
        self.url = self.url.trim().to_string();
        require(&self.label_mn, "labelMn")?;
        require(&self.url, "url")?;
        self.label_ru = non_blank(self.label_ru);
        self.label_en = non_blank(self.label_en);
        Ok(self)
    }
}

/// A navigation entry with its children, for rendering menus.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationNode {
    #[serde(flatten)]
    pub item: NavigationItem,
    pub children: Vec<NavigationNode>,
}

/// Build the menu tree from flat rows.
///
/// Siblings keep the order of `items` (the repository sorts by
/// `sort_order, id`). Rows whose parent is missing, or who are their own
/// parent, are promoted to the root. Rows in a longer parent cycle never
/// reach the root and are left out.
#[must_use]
pub fn build_navigation_tree(items: Vec<NavigationItem>) -> Vec<NavigationNode> {
    let known: std::collections::HashSet<NavigationItemId> = items.iter().map(|i| i.id).collect();
    let mut children: HashMap<Option<NavigationItemId>, Vec<NavigationItem>> = HashMap::new();
    for item in items {
        let parent = item.parent_id.filter(|p| known.contains(p) && *p != item.id);
        children.entry(parent).or_default().push(item);
    }

    let mut visited = std::collections::HashSet::new();
    attach(None, &mut children, &mut visited)
}

fn attach(
    parent: Option<NavigationItemId>,
    children: &mut HashMap<Option<NavigationItemId>, Vec<NavigationItem>>,
    visited: &mut std::collections::HashSet<NavigationItemId>,
) -> Vec<NavigationNode> {
    let Some(level) = children.remove(&parent) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(level.len());
    for item in level {
        if !visited.insert(item.id) {
            continue;
        }
        let nested = attach(Some(item.id), children, visited);
        out.push(NavigationNode {
            item,
            children: nested,
        });
    }
    out
}

/// An uploaded file tracked in the media library.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: MediaId,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub url: String,
    pub alt_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A bank account shown on the checkout page for transfers.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub id: BankAccountId,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountInput {
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    #[serde(default)]
    pub is_default: bool,
}

impl BankAccountInput {
    /// # Errors
    ///
    /// Returns a message naming the first blank field.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.bank_name = self.bank_name.trim().to_string();
        self.account_number = self.account_number.trim().to_string();
        self.account_holder = self.account_holder.trim().to_string();
        require(&self.bank_name, "bankName")?;
        require(&self.account_number, "accountNumber")?;
        require(&self.account_holder, "accountHolder")?;
        Ok(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn nav(id: i32, parent: Option<i32>, label: &str) -> NavigationItem {
        NavigationItem {
            id: NavigationItemId::new(id),
            parent_id: parent.map(NavigationItemId::new),
            label_mn: label.to_string(),
            label_ru: None,
            label_en: None,
            url: format!("/{label}"),
            sort_order: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_navigation_tree_nests_children_in_order() {
        let tree = build_navigation_tree(vec![
            nav(1, None, "products"),
            nav(2, Some(1), "beef"),
            nav(3, Some(1), "lamb"),
            nav(4, None, "contact"),
            nav(5, Some(2), "steaks"),
        ]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].item.label_mn, "products");
        let children: Vec<_> = tree[0].children.iter().map(|c| c.item.label_mn.as_str()).collect();
        assert_eq!(children, ["beef", "lamb"]);
        assert_eq!(tree[0].children[0].children[0].item.label_mn, "steaks");
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_build_navigation_tree_promotes_orphans_and_cuts_self_loops() {
        let tree = build_navigation_tree(vec![nav(1, Some(99), "orphan"), nav(2, Some(2), "self")]);
        let labels: Vec<_> = tree.iter().map(|n| n.item.label_mn.as_str()).collect();
        assert_eq!(labels, ["orphan", "self"]);
    }

    #[test]
    fn test_navigation_node_serializes_flat() {
        let tree = build_navigation_tree(vec![nav(1, None, "home")]);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json[0]["labelMn"], "home");
        assert_eq!(json[0]["children"], serde_json::json!([]));
    }

    #[test]
    fn test_bank_account_input_requires_fields() {
        let input = BankAccountInput {
            bank_name: "Хаан банк".to_string(),
            account_number: " ".to_string(),
            account_holder: "Гэрийн мах ХХК".to_string(),
            is_default: false,
        };
        assert_eq!(input.normalize().unwrap_err(), "accountNumber is required");
    }
}
