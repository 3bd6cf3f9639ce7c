//! Domain models for the storefront.
//!
//! Row types derive `sqlx::FromRow` and `Serialize` so repositories can
//! return them straight to handlers. Input types derive `Deserialize` and
//! carry their own `validate` methods.

pub mod catalog;
pub mod content;
pub mod delivery;
pub mod meal_kit;
pub mod order;
pub mod review;
pub mod session;
pub mod store;
pub mod user;

pub use catalog::{Category, CategoryInput, Product, ProductFilter, ProductInput};
pub use content::{
    BankAccount, BankAccountInput, FooterSettings, FooterSettingsInput, MediaItem,
    NavigationInput, NavigationItem, NavigationNode, SiteContent, SiteContentInput, SiteSetting,
};
pub use delivery::{
    DeliveryRejection, DeliverySettings, DeliverySettingsInput, NonDeliveryDay, NonDeliveryDayInput,
};
pub use meal_kit::{
    ComponentInput, GeneratedMealKit, GeneratedMealKitInput, GeneratedMealKitWithComponents,
    MealKit, MealKitComponent, MealKitInput, MealKitWithComponents,
};
pub use order::{NewOrder, Order, OrderItem, OrderLine, OrderWithItems};
pub use review::{Review, ReviewInput};
pub use session::CurrentUser;
pub use store::{ServiceCategory, ServiceCategoryInput, Store, StoreInput, StoreWithProducts};
pub use user::{NewUser, PublicUser, User};

/// Trim an optional string and drop it when blank.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reject an empty required field.
pub(crate) fn require(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(" Улаанбаатар ".to_string())).as_deref(), Some("Улаанбаатар"));
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_require() {
        assert!(require("мах", "name_mn").is_ok());
        assert_eq!(require(" ", "name_mn"), Err("name_mn is required".to_string()));
    }
}
