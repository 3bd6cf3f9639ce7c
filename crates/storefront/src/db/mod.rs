//! Database operations for the Gerinmah `PostgreSQL` database.
//!
//! One repository per entity, each borrowing the shared pool:
//!
//! ```rust,ignore
//! let product = ProductRepository::new(state.pool()).get(id).await?;
//! ```
//!
//! ## Tables
//!
//! - `users` - Customer and admin accounts (password and/or Google)
//! - `categories`, `products` - Catalog
//! - `orders`, `order_items` - Orders with their line items
//! - `site_content`, `site_settings`, `footer_settings` - CMS text and settings
//! - `navigation_items`, `media_library`, `bank_accounts`
//! - `service_categories`, `stores`, `store_products` - Store listings
//! - `reviews` - Product reviews awaiting moderation
//! - `delivery_settings`, `non_delivery_days` - Delivery calendar
//! - `meal_kits`, `generated_meal_kits` (+ components)
//! - `tower_sessions.session` - Session storage (managed by `tower-sessions-sqlx-store`)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p gerinmah-cli -- migrate
//! ```

pub mod bank_accounts;
pub mod categories;
pub mod content;
pub mod delivery;
pub mod meal_kits;
pub mod media;
pub mod navigation;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod stores;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use bank_accounts::BankAccountRepository;
pub use categories::CategoryRepository;
pub use content::ContentRepository;
pub use delivery::DeliveryRepository;
pub use meal_kits::MealKitRepository;
pub use media::MediaRepository;
pub use navigation::NavigationRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use stores::StoreRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A business rule rejected the write (insufficient stock, closed day...).
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Map unique and foreign-key violations to `Conflict`, everything else to `Database`.
pub(crate) fn map_constraint(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(format!("{what} already exists"));
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::Conflict(format!("{what} references a missing or in-use row"));
        }
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool.
///
/// Up to 20 connections; idle connections are closed after 30 seconds and
/// acquiring a connection gives up after 10 seconds.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(1)
        .idle_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
