//! HTTP route handlers for the Bazaar JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                               - Liveness
//! GET  /health/ready                         - Database readiness
//!
//! # Auth (rate limited)
//! POST /api/auth/register                    - Create account, start session
//! POST /api/auth/login                       - Start session
//! POST /api/auth/logout                      - End session
//! GET  /api/auth/me                          - Current user
//!
//! # Account (user)
//! PUT  /api/account/profile                  - Name and email
//! PUT  /api/account/password                 - Change password
//! GET  /api/account/addresses                - Saved addresses
//! POST /api/account/addresses
//! PUT  /api/account/addresses/{id}
//! DELETE /api/account/addresses/{id}
//!
//! # Catalog (public reads, admin writes)
//! GET  /api/categories                       - Active categories
//! GET  /api/categories/{id}
//! POST /api/categories
//! PUT  /api/categories/{id}
//! DELETE /api/categories/{id}?hard=bool
//! GET  /api/products                         - Filter, search, sort, page
//! GET  /api/products/{id}
//! GET  /api/products/slug/{slug}
//! POST /api/products
//! PUT  /api/products/{id}
//! DELETE /api/products/{id}                  - Deactivate
//! POST /api/products/bulk
//! POST /api/products/{id}/variants
//! PUT  /api/products/{id}/variants/{variant_id}
//! DELETE /api/products/{id}/variants/{variant_id}
//! GET  /api/products/{id}/reviews            - Approved reviews and summary
//! POST /api/products/{id}/reviews            - Post a review (user)
//! GET  /api/reviews                          - Moderation queue (admin)
//! PATCH /api/reviews/{id}
//! DELETE /api/reviews/{id}
//!
//! # Shopping (user)
//! GET  /api/cart
//! DELETE /api/cart
//! POST /api/cart/items
//! PUT  /api/cart/items/{id}
//! DELETE /api/cart/items/{id}
//! POST /api/checkout
//! POST /api/coupons/validate                 - Preview a discount
//!
//! # Orders (own for users, all for admins)
//! GET  /api/orders
//! GET  /api/orders/{id}
//! GET  /api/orders/{id}/invoice
//! POST /api/orders/{id}/cancel
//! PATCH /api/orders/{id}/status              - Admin
//! PATCH /api/orders/{id}/payment             - Admin
//! GET  /api/invoices                         - Admin
//! GET  /api/invoices/{id}                    - Admin
//!
//! # Back office (admin)
//! GET  /api/customers
//! GET  /api/customers/{id}
//! PATCH /api/customers/{id}
//! GET  /api/warehouses, POST /api/warehouses
//! GET|PUT|DELETE /api/warehouses/{id}
//! GET|PUT /api/warehouses/{id}/inventory
//! POST /api/warehouses/{id}/inventory/adjust
//! GET  /api/inventory/low-stock
//! GET  /api/stock-transfers, POST /api/stock-transfers
//! GET  /api/stock-transfers/{id}
//! PATCH /api/stock-transfers/{id}/status
//! GET  /api/coupons, POST /api/coupons
//! PUT|DELETE /api/coupons/{id}
//! GET  /api/shipping-zones, POST /api/shipping-zones
//! PUT|DELETE /api/shipping-zones/{id}
//! GET  /api/api-keys, POST /api/api-keys     - Session only
//! DELETE /api/api-keys/{id}                  - Session only
//! GET  /api/analytics/summary?days=
//!
//! # Public
//! GET  /api/shipping/quote?country=&subtotal=
//!
//! # Support (own for users, all for admins)
//! GET  /api/tickets, POST /api/tickets
//! GET  /api/tickets/{id}
//! PATCH /api/tickets/{id}                    - Admin
//! POST /api/tickets/{id}/messages
//! GET  /api/chat/conversations, POST /api/chat/conversations
//! GET  /api/chat/conversations/{id}/messages?after=
//! POST /api/chat/conversations/{id}/messages
//! POST /api/chat/conversations/{id}/read
//! POST /api/chat/conversations/{id}/close    - Admin
//!
//! # Notifications (user)
//! GET  /api/notifications
//! POST /api/notifications/read-all
//! POST /api/notifications/{id}/read
//! DELETE /api/notifications/{id}
//! ```

pub mod account;
pub mod analytics;
pub mod api_keys;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod chat;
pub mod checkout;
pub mod coupons;
pub mod customers;
pub mod health;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod shipping;
pub mod tickets;

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};
use serde::Deserialize;

use bazaar_core::Slug;

use crate::db::Page;
use crate::error::{AppError, Result};
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::response::Paginated;
use crate::state::AppState;

/// `?page=&per_page=` for list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    /// Clamped limit and offset.
    #[must_use]
    pub fn page(&self) -> Page {
        Page::new(self.page, self.per_page)
    }

    /// Wrap one page of results with the paging the client asked for.
    #[must_use]
    pub fn paginate<T>(&self, items: Vec<T>, total: i64) -> Paginated<T> {
        let page = self.page();
        Paginated {
            items,
            total,
            page: self.page.unwrap_or(1).max(1),
            per_page: u32::try_from(page.limit).unwrap_or(Page::MAX_PER_PAGE),
        }
    }
}

/// Use the submitted slug, or derive one from the name.
pub(crate) fn slug_or_from_name(slug: Option<&str>, name: &str) -> Result<Slug> {
    match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => Slug::parse(slug).map_err(|e| AppError::field("slug", e.to_string())),
        None => Slug::from_name(name).map_err(|e| AppError::field("slug", e.to_string())),
    }
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", put(account::update_profile))
        .route("/password", put(account::change_password))
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route(
            "/addresses/{id}",
            put(account::update_address).delete(account::delete_address),
        )
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index).post(categories::create))
        .route(
            "/{id}",
            get(categories::show)
                .put(categories::update)
                .delete(categories::delete),
        )
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/bulk", post(products::bulk))
        .route("/slug/{slug}", get(products::show_by_slug))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/{id}/variants", post(products::create_variant))
        .route(
            "/{id}/variants/{variant_id}",
            put(products::update_variant).delete(products::delete_variant),
        )
        .route(
            "/{id}/reviews",
            get(reviews::for_product).post(reviews::create),
        )
}

/// Create the review moderation routes router.
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(reviews::index))
        .route("/{id}", patch(reviews::moderate).delete(reviews::delete))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            put(cart::update_item).delete(cart::remove_item),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/invoice", get(orders::invoice))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/status", patch(orders::update_status))
        .route("/{id}/payment", patch(orders::update_payment))
}

/// Create the invoice routes router.
pub fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::invoices))
        .route("/{id}", get(orders::show_invoice))
}

/// Create the customer routes router.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(customers::index))
        .route("/{id}", get(customers::show).patch(customers::update))
}

/// Create the warehouse and stock level routes router.
pub fn warehouse_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(inventory::warehouses).post(inventory::create_warehouse),
        )
        .route(
            "/{id}",
            get(inventory::show_warehouse)
                .put(inventory::update_warehouse)
                .delete(inventory::delete_warehouse),
        )
        .route(
            "/{id}/inventory",
            get(inventory::levels).put(inventory::set_level),
        )
        .route("/{id}/inventory/adjust", post(inventory::adjust))
}

/// Create the stock transfer routes router.
pub fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(inventory::transfers).post(inventory::create_transfer),
        )
        .route("/{id}", get(inventory::show_transfer))
        .route("/{id}/status", patch(inventory::update_transfer_status))
}

/// Create the coupon routes router.
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(coupons::index).post(coupons::create))
        .route("/validate", post(coupons::validate))
        .route("/{id}", put(coupons::update).delete(coupons::delete))
}

/// Create the shipping zone routes router.
pub fn shipping_zone_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(shipping::index).post(shipping::create))
        .route("/{id}", put(shipping::update).delete(shipping::delete))
}

/// Create the ticket routes router.
pub fn ticket_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(tickets::index).post(tickets::create))
        .route("/{id}", get(tickets::show).patch(tickets::update))
        .route("/{id}/messages", post(tickets::reply))
}

/// Create the chat routes router.
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            get(chat::conversations).post(chat::open),
        )
        .route(
            "/conversations/{id}/messages",
            get(chat::messages).post(chat::post),
        )
        .route("/conversations/{id}/read", post(chat::mark_read))
        .route("/conversations/{id}/close", post(chat::close))
}

/// Create the notification routes router.
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::index))
        .route("/read-all", post(notifications::mark_all_read))
        .route("/{id}/read", post(notifications::mark_read))
        .route("/{id}", delete(notifications::delete))
}

/// Create the API key routes router.
pub fn api_key_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(api_keys::index).post(api_keys::create))
        .route("/{id}", delete(api_keys::revoke))
}

/// Create all API routes, rate limited.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/account", account_routes())
        .nest("/categories", category_routes())
        .nest("/products", product_routes())
        .nest("/reviews", review_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", post(checkout::place_order))
        .nest("/orders", order_routes())
        .nest("/invoices", invoice_routes())
        .nest("/customers", customer_routes())
        .nest("/warehouses", warehouse_routes())
        .route("/inventory/low-stock", get(inventory::low_stock))
        .nest("/stock-transfers", transfer_routes())
        .nest("/coupons", coupon_routes())
        .nest("/shipping-zones", shipping_zone_routes())
        .route("/shipping/quote", get(shipping::quote))
        .nest("/tickets", ticket_routes())
        .nest("/chat", chat_routes())
        .nest("/notifications", notification_routes())
        .nest("/api-keys", api_key_routes())
        .route("/analytics/summary", get(analytics::summary))
        .layer(api_rate_limiter())
}

/// Create all routes for the application.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        // Auth gets its own, stricter limiter
        .nest("/api/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/api", api_routes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_echoes_clamped_paging() {
        let query = PageQuery {
            page: Some(0),
            per_page: Some(500),
        };
        let page = query.paginate(vec![1, 2, 3], 3);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, Page::MAX_PER_PAGE);
        assert_eq!(page.total, 3);

        let page = PageQuery::default().paginate(Vec::<i32>::new(), 0);
        assert_eq!(page.per_page, 20);
    }

    #[test]
    fn test_slug_or_from_name() {
        assert_eq!(
            slug_or_from_name(None, "Summer Hats").unwrap().as_str(),
            "summer-hats"
        );
        assert_eq!(
            slug_or_from_name(Some("  "), "Caps").unwrap().as_str(),
            "caps"
        );
        assert_eq!(
            slug_or_from_name(Some("straw-hat"), "Ignored").unwrap().as_str(),
            "straw-hat"
        );
        assert!(matches!(
            slug_or_from_name(Some("Not A Slug"), "x"),
            Err(AppError::Validation(_))
        ));
    }
}
