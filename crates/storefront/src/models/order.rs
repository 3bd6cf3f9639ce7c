//! Order types and the line-merging rule used on checkout.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gerinmah_core::{Email, Lang, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

use super::{non_blank, require};

/// Largest quantity accepted for a single product in one order.
pub const MAX_LINE_QUANTITY: i32 = 1_000;

/// An order row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub delivery_address: String,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order line, joined with the product names for display.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub product_name_mn: String,
    pub product_name_ru: Option<String>,
    pub product_name_en: Option<String>,
}

impl OrderItem {
    #[must_use]
    pub fn product_name(&self, lang: Lang) -> &str {
        lang.pick(
            &self.product_name_mn,
            self.product_name_ru.as_deref(),
            self.product_name_en.as_deref(),
        )
    }

    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// One requested line on checkout. Prices come from the product row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Checkout payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub delivery_address: String,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub items: Vec<OrderLine>,
    /// Language for the confirmation email.
    #[serde(default)]
    pub lang: Lang,
}

impl NewOrder {
    /// Trim fields, validate contact details and merge duplicate lines.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.customer_name = self.customer_name.trim().to_string();
        self.customer_phone = self.customer_phone.trim().to_string();
        self.delivery_address = self.delivery_address.trim().to_string();
        require(&self.customer_name, "customerName")?;
        require(&self.customer_phone, "customerPhone")?;
        require(&self.delivery_address, "deliveryAddress")?;

        self.customer_email = match non_blank(self.customer_email) {
            Some(raw) => Some(
                Email::parse(&raw)
                    .map_err(|e| format!("customerEmail: {e}"))?
                    .into_inner(),
            ),
            None => None,
        };
        self.notes = non_blank(self.notes);
        self.payment_method = non_blank(self.payment_method);
        self.items = merge_lines(&self.items)?;
        Ok(self)
    }

    #[must_use]
    pub fn payment_method_or_default(&self) -> &str {
        self.payment_method.as_deref().unwrap_or("bank_transfer")
    }
}

/// Merge lines for the same product and order them by product id.
///
/// Ordering by id also fixes the row-lock order when stock is decremented.
///
/// # Errors
///
/// Returns a message if there are no lines, a quantity is not positive, or a
/// merged quantity exceeds [`MAX_LINE_QUANTITY`].
pub fn merge_lines(lines: &[OrderLine]) -> Result<Vec<OrderLine>, String> {
    if lines.is_empty() {
        return Err("order has no items".to_string());
    }

    let mut merged: BTreeMap<ProductId, i32> = BTreeMap::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(format!(
                "quantity for product {} must be positive",
                line.product_id
            ));
        }
        let total = merged.entry(line.product_id).or_insert(0);
        *total = total
            .checked_add(line.quantity)
            .filter(|q| *q <= MAX_LINE_QUANTITY)
            .ok_or_else(|| format!("quantity for product {} is too large", line.product_id))?;
    }

    Ok(merged
        .into_iter()
        .map(|(product_id, quantity)| OrderLine {
            product_id,
            quantity,
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(product: i32, quantity: i32) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    #[test]
    fn test_merge_lines_combines_duplicates() {
        let merged = merge_lines(&[line(3, 1), line(1, 2), line(3, 4)]).unwrap();
        assert_eq!(merged, vec![line(1, 2), line(3, 5)]);
    }

    #[test]
    fn test_merge_lines_rejects_bad_input() {
        assert!(merge_lines(&[]).is_err());
        assert!(merge_lines(&[line(1, 0)]).is_err());
        assert!(merge_lines(&[line(1, -2)]).is_err());
        assert!(merge_lines(&[line(1, MAX_LINE_QUANTITY), line(1, 1)]).is_err());
        assert!(merge_lines(&[line(1, i32::MAX), line(1, 1)]).is_err());
    }

    #[test]
    fn test_new_order_normalize() {
        let order: NewOrder = serde_json::from_str(
            r#"{
                "customerName": " Болд ",
                "customerPhone": "99112233",
                "customerEmail": " Bold@Mail.MN ",
                "deliveryAddress": "БЗД, 3-р хороо",
                "deliveryDate": "2026-11-02",
                "items": [{"productId": 2, "quantity": 1}, {"productId": 2, "quantity": 2}]
            }"#,
        )
        .unwrap();
        let order = order.normalize().unwrap();
        assert_eq!(order.customer_name, "Болд");
        assert_eq!(order.customer_email.as_deref(), Some("bold@mail.mn"));
        assert_eq!(order.items, vec![line(2, 3)]);
        assert_eq!(order.payment_method_or_default(), "bank_transfer");
        assert_eq!(order.lang, Lang::Mn);
    }

    #[test]
    fn test_new_order_requires_contact_details() {
        let order: NewOrder = serde_json::from_str(
            r#"{"customerName":"","customerPhone":"1","deliveryAddress":"x","items":[{"productId":1,"quantity":1}]}"#,
        )
        .unwrap();
        assert!(order.normalize().is_err());
    }

    #[test]
    fn test_order_item_line_total() {
        let item = OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(1),
            product_id: ProductId::new(1),
            quantity: 3,
            unit_price: Decimal::new(1250, 2),
            product_name_mn: "Хонины хавирга".to_string(),
            product_name_ru: None,
            product_name_en: Some("Lamb ribs".to_string()),
        };
        assert_eq!(item.line_total(), Decimal::new(3750, 2));
        assert_eq!(item.product_name(Lang::En), "Lamb ribs");
        assert_eq!(item.product_name(Lang::Ru), "Хонины хавирга");
    }
}
