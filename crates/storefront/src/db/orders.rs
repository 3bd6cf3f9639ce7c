//! Order repository.
//!
//! Checkout runs in a single transaction: stock for every line is decremented
//! with a guarded `UPDATE ... WHERE stock >= qty`, so two concurrent orders
//! can never oversell a product. Cancelling an order puts the stock back;
//! cancelled is terminal, so that happens at most once per order.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use gerinmah_core::{OrderId, OrderStatus, ProductId, UserId};

use super::RepositoryError;
use crate::models::delivery::DeliveryRejection;
use crate::models::{DeliverySettings, NewOrder, Order, OrderItem, OrderWithItems};

const ORDER_COLUMNS: &str = "id, user_id, status, total_amount, customer_name, customer_phone, \
    customer_email, delivery_address, delivery_date, notes, payment_method, created_at, updated_at";

const ITEM_SELECT: &str = "SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.unit_price,
           p.name_mn AS product_name_mn, p.name_ru AS product_name_ru,
           p.name_en AS product_name_en
    FROM order_items oi
    JOIN products p ON p.id = oi.product_id";

/// Reasons an order cannot be placed or moved.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("product {0} is unavailable")]
    ProductUnavailable(ProductId),

    #[error("insufficient stock for product {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: ProductId,
        requested: i32,
        available: i32,
    },

    #[error("no deliveries on {0}")]
    NonDeliveryDay(NaiveDate),

    #[error("delivery date rejected: {0:?}")]
    DeliveryDate(DeliveryRejection),

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Repository for orders and their lines.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order.
    ///
    /// `order` must already be normalized, so its lines are merged and
    /// sorted by product id.
    ///
    /// # Errors
    ///
    /// Returns an `OrderError` describing the rejection; nothing is written
    /// in that case.
    pub async fn create(
        &self,
        user_id: Option<UserId>,
        order: &NewOrder,
    ) -> Result<OrderWithItems, OrderError> {
        let mut tx = self.pool.begin().await?;

        let settings = sqlx::query_as::<_, DeliverySettings>(
            "SELECT delivery_fee, free_delivery_threshold, min_order_amount, cutoff_hour, updated_at
             FROM delivery_settings WHERE id = 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(date) = order.delivery_date {
            let closed: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM non_delivery_days WHERE day = $1)")
                    .bind(date)
                    .fetch_one(&mut *tx)
                    .await?;
            if closed {
                return Err(OrderError::NonDeliveryDay(date));
            }
            if let Some(settings) = &settings {
                settings
                    .check_date(date, Utc::now())
                    .map_err(OrderError::DeliveryDate)?;
            }
        }

        let mut priced = Vec::with_capacity(order.items.len());
        let mut subtotal = Decimal::ZERO;
        for line in &order.items {
            let unit_price = take_stock(&mut tx, line.product_id, line.quantity).await?;
            subtotal += unit_price * Decimal::from(line.quantity);
            priced.push((line.product_id, line.quantity, unit_price));
        }

        let total = match &settings {
            Some(settings) => settings
                .total_for(subtotal)
                .map_err(OrderError::DeliveryDate)?,
            None => subtotal,
        };

        let created = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (user_id, total_amount, customer_name, customer_phone,
                                 customer_email, delivery_address, delivery_date, notes,
                                 payment_method)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(total)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(order.customer_email.as_deref())
        .bind(&order.delivery_address)
        .bind(order.delivery_date)
        .bind(order.notes.as_deref())
        .bind(order.payment_method_or_default())
        .fetch_one(&mut *tx)
        .await?;

        for (product_id, quantity, unit_price) in priced {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, unit_price)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(created.id)
            .bind(product_id)
            .bind(quantity)
            .bind(unit_price)
            .execute(&mut *tx)
            .await?;
        }

        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "{ITEM_SELECT} WHERE oi.order_id = $1 ORDER BY oi.id"
        ))
        .bind(created.id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %created.id,
            total = %created.total_amount,
            lines = items.len(),
            "Order placed"
        );

        Ok(OrderWithItems {
            order: created,
            items,
        })
    }

    /// Orders placed by one user, newest first, with their lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrderWithItems>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        self.with_items(orders).await
    }

    /// Every order, newest first, with their lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(&self) -> Result<Vec<OrderWithItems>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        self.with_items(orders).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<OrderWithItems>, RepositoryError> {
        let Some(order) = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "{ITEM_SELECT} WHERE oi.order_id = $1 ORDER BY oi.id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(OrderWithItems { order, items }))
    }

    /// Move an order to a new status.
    ///
    /// Cancelling restores the stock taken at checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` (wrapped) for an unknown order and
    /// `OrderError::InvalidTransition` when the move is not allowed.
    pub async fn update_status(&self, id: OrderId, next: OrderStatus) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<OrderStatus> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.ok_or(RepositoryError::NotFound)?;

        if !current.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        if next == OrderStatus::Cancelled {
            let restored = sqlx::query(
                "UPDATE products p
                 SET stock = p.stock + oi.quantity, updated_at = NOW()
                 FROM (SELECT product_id, SUM(quantity)::INTEGER AS quantity
                       FROM order_items WHERE order_id = $1 GROUP BY product_id) oi
                 WHERE p.id = oi.product_id",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
            tracing::info!(
                order_id = %id,
                products = restored.rows_affected(),
                "Restored stock for cancelled order"
            );
        }

        let updated = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(next)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Number of orders waiting for confirmation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pending_count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = $1")
            .bind(OrderStatus::Pending)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    async fn with_items(&self, orders: Vec<Order>) -> Result<Vec<OrderWithItems>, RepositoryError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = orders.iter().map(|o| o.id.as_i32()).collect();
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "{ITEM_SELECT} WHERE oi.order_id = ANY($1) ORDER BY oi.order_id, oi.id"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;
        Ok(group_items(orders, items))
    }
}

/// Decrement stock for one line and return the product's current price.
async fn take_stock(
    tx: &mut Transaction<'_, Postgres>,
    product: ProductId,
    quantity: i32,
) -> Result<Decimal, OrderError> {
    let price: Option<Decimal> = sqlx::query_scalar(
        "UPDATE products SET stock = stock - $2, updated_at = NOW()
         WHERE id = $1 AND is_active AND stock >= $2
         RETURNING price",
    )
    .bind(product)
    .bind(quantity)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(price) = price {
        return Ok(price);
    }

    let available: Option<i32> =
        sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 AND is_active")
            .bind(product)
            .fetch_optional(&mut **tx)
            .await?;
    match available {
        Some(available) => Err(OrderError::InsufficientStock {
            product,
            requested: quantity,
            available,
        }),
        None => Err(OrderError::ProductUnavailable(product)),
    }
}

/// Attach lines to their orders, keeping the order of `orders`.
fn group_items(orders: Vec<Order>, items: Vec<OrderItem>) -> Vec<OrderWithItems> {
    let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }
    orders
        .into_iter()
        .map(|order| {
            let items = by_order.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;

    use gerinmah_core::OrderItemId;

    use super::*;

    fn order(id: i32) -> Order {
        Order {
            id: OrderId::new(id),
            user_id: None,
            status: OrderStatus::Pending,
            total_amount: Decimal::ZERO,
            customer_name: "Сараа".to_string(),
            customer_phone: "88001122".to_string(),
            customer_email: None,
            delivery_address: "ХУД".to_string(),
            delivery_date: None,
            notes: None,
            payment_method: "bank_transfer".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(id: i32, order_id: i32) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(id),
            order_id: OrderId::new(order_id),
            product_id: ProductId::new(1),
            quantity: 1,
            unit_price: Decimal::ONE,
            product_name_mn: "Гахайн мах".to_string(),
            product_name_ru: None,
            product_name_en: None,
        }
    }

    #[test]
    fn test_group_items_keeps_order_sequence() {
        let grouped = group_items(
            vec![order(9), order(4), order(7)],
            vec![item(1, 4), item(2, 9), item(3, 4)],
        );
        let ids: Vec<_> = grouped.iter().map(|o| o.order.id.as_i32()).collect();
        assert_eq!(ids, [9, 4, 7]);
        assert_eq!(grouped[0].items.len(), 1);
        assert_eq!(grouped[1].items.len(), 2);
        assert!(grouped[2].items.is_empty());
    }

    #[test]
    fn test_order_error_messages() {
        let err = OrderError::InsufficientStock {
            product: ProductId::new(3),
            requested: 5,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for product 3: requested 5, available 2"
        );
    }
}
