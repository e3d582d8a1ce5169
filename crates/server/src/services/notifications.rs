//! System-generated in-app notifications.
//!
//! Creating a notification is a side effect of another operation, so a
//! failure here is logged and never fails the caller.

use sqlx::PgPool;

use bazaar_core::{NotificationKind, UserId};

use crate::db::NotificationRepository;
use crate::models::Order;

/// Create a notification, logging instead of returning errors.
pub async fn notify(
    pool: &PgPool,
    user_id: UserId,
    kind: NotificationKind,
    title: &str,
    body: &str,
    link: Option<&str>,
) {
    if let Err(e) = NotificationRepository::new(pool)
        .create(user_id, kind, title, body, link)
        .await
    {
        tracing::warn!(error = %e, %user_id, kind = %kind, "Failed to create notification");
    }
}

/// Tell the owner their order was placed.
pub async fn order_placed(pool: &PgPool, order: &Order) {
    let link = order_link(order);
    notify(
        pool,
        order.user_id,
        NotificationKind::OrderPlaced,
        &format!("Order {} placed", order.order_number),
        &format!("We received your order. Total: {}", order.total),
        Some(&link),
    )
    .await;
}

/// Tell the owner their order changed status.
pub async fn order_status_changed(pool: &PgPool, order: &Order) {
    let link = order_link(order);
    notify(
        pool,
        order.user_id,
        NotificationKind::OrderStatus,
        &format!("Order {} is now {}", order.order_number, order.status),
        &order.tracking_number.as_ref().map_or_else(
            || format!("Your order status changed to {}.", order.status),
            |tracking| format!("Your order status changed to {}. Tracking: {tracking}", order.status),
        ),
        Some(&link),
    )
    .await;
}

fn order_link(order: &Order) -> String {
    format!("/api/orders/{}", order.id)
}
