//! Database operations for the Bazaar `PostgreSQL` store.
//!
//! ## Tables (schema `shop`)
//!
//! - `users`, `addresses` - Accounts and saved addresses
//! - `categories`, `products`, `variants` - Catalog
//! - `cart_items` - One cart per user
//! - `orders`, `order_items`, `invoices` - Orders and their frozen invoices
//! - `coupons` - Marketing discounts
//! - `warehouses`, `inventory`, `stock_transfers` - Multi-warehouse stock
//! - `reviews`, `tickets`, `ticket_messages` - Customer feedback and support
//! - `chat_conversations`, `chat_messages` - Polled support chat
//! - `notifications`, `shipping_zones`, `api_keys`
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p bazaar-cli -- migrate
//! ```

pub mod addresses;
pub mod analytics;
pub mod api_keys;
pub mod carts;
pub mod categories;
pub mod chat;
pub mod coupons;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod shipping_zones;
pub mod tickets;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use analytics::AnalyticsRepository;
pub use api_keys::ApiKeyRepository;
pub use carts::CartRepository;
pub use categories::CategoryRepository;
pub use chat::ChatRepository;
pub use coupons::CouponRepository;
pub use inventory::InventoryRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use shipping_zones::ShippingZoneRepository;
pub use tickets::TicketRepository;
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

    /// Constraint violation (e.g., unique slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(message: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    let message = message.to_owned();
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message);
        }
        RepositoryError::Database(e)
    }
}

/// Limit and offset for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Largest page size a client may request.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Build a page from 1-based `page` and `per_page`, clamping both.
    #[must_use]
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        let per_page = per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE);
        let page = page.unwrap_or(1).max(1);
        Self {
            limit: i64::from(per_page),
            offset: i64::from(page - 1) * i64::from(per_page),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_clamping() {
        assert_eq!(Page::new(None, None), Page { limit: 20, offset: 0 });
        assert_eq!(Page::new(Some(3), Some(10)), Page { limit: 10, offset: 20 });
        assert_eq!(Page::new(Some(0), Some(500)), Page { limit: 100, offset: 0 });
    }
}
