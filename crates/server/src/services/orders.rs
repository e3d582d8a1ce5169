//! Order lifecycle: admin status and payment changes, shopper cancellation.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use bazaar_core::{OrderId, OrderStatus, PaymentStatus, UserId};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::Order;
use crate::services::notifications;

/// Order lifecycle errors.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    #[error("order is already {0}")]
    SameStatus(OrderStatus),

    #[error("cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("orders can only be cancelled while pending or confirmed (this one is {0})")]
    NotCancellable(OrderStatus),

    #[error("payment is already {0}")]
    SamePaymentStatus(PaymentStatus),

    #[error("cannot move a payment from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Check an admin status change.
///
/// # Errors
///
/// Returns `OrderError::SameStatus` for a no-op and
/// `OrderError::InvalidTransition` for a move the lifecycle forbids.
pub fn check_transition(current: OrderStatus, next: OrderStatus) -> Result<(), OrderError> {
    if current == next {
        return Err(OrderError::SameStatus(current));
    }
    if !current.can_transition_to(next) {
        return Err(OrderError::InvalidTransition {
            from: current,
            to: next,
        });
    }
    Ok(())
}

/// Check a payment status change.
///
/// # Errors
///
/// Returns `OrderError::SamePaymentStatus` or
/// `OrderError::InvalidPaymentTransition`.
pub fn check_payment_transition(
    current: PaymentStatus,
    next: PaymentStatus,
) -> Result<(), OrderError> {
    if current == next {
        return Err(OrderError::SamePaymentStatus(current));
    }
    if !current.can_transition_to(next) {
        return Err(OrderError::InvalidPaymentTransition {
            from: current,
            to: next,
        });
    }
    Ok(())
}

/// Order lifecycle operations.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
        }
    }

    /// Admin status change. Cancelling restocks the items.
    ///
    /// # Errors
    ///
    /// Returns `OrderError` if the order is missing or the move is not allowed.
    #[instrument(skip(self, tracking_number))]
    pub async fn change_status(
        &self,
        id: OrderId,
        next: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<Order, OrderError> {
        let order = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;
        check_transition(order.status, next)?;

        let updated = if next == OrderStatus::Cancelled {
            self.orders.cancel(id, order.status).await?
        } else {
            self.orders
                .update_status(id, order.status, next, tracking_number)
                .await?
        };

        tracing::info!(
            order_number = %updated.order_number,
            from = %order.status,
            to = %updated.status,
            "Order status changed"
        );
        notifications::order_status_changed(self.pool, &updated).await;
        Ok(updated)
    }

    /// Shopper cancellation of their own order.
    ///
    /// Someone else's order is reported as not found.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotCancellable` once the order is past
    /// `confirmed`.
    #[instrument(skip(self))]
    pub async fn cancel_own(&self, user_id: UserId, id: OrderId) -> Result<Order, OrderError> {
        let order = self
            .orders
            .get(id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(OrderError::NotFound)?;

        if !order.status.is_customer_cancellable() {
            return Err(OrderError::NotCancellable(order.status));
        }

        let cancelled = self.orders.cancel(id, order.status).await?;
        tracing::info!(order_number = %cancelled.order_number, "Order cancelled by customer");
        notifications::order_status_changed(self.pool, &cancelled).await;
        Ok(cancelled)
    }

    /// Admin payment status change.
    ///
    /// # Errors
    ///
    /// Returns `OrderError` if the order is missing or the move is not allowed.
    #[instrument(skip(self))]
    pub async fn change_payment(
        &self,
        id: OrderId,
        next: PaymentStatus,
    ) -> Result<Order, OrderError> {
        let order = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;
        check_payment_transition(order.payment_status, next)?;
        Ok(self
            .orders
            .update_payment(id, order.payment_status, next)
            .await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        check_transition(OrderStatus::Pending, OrderStatus::Confirmed).unwrap();
        check_transition(OrderStatus::Confirmed, OrderStatus::Processing).unwrap();
        check_transition(OrderStatus::Processing, OrderStatus::Shipped).unwrap();
        check_transition(OrderStatus::Shipped, OrderStatus::Delivered).unwrap();
        check_transition(OrderStatus::Processing, OrderStatus::Cancelled).unwrap();
    }

    #[test]
    fn test_same_status_rejected() {
        assert!(matches!(
            check_transition(OrderStatus::Shipped, OrderStatus::Shipped),
            Err(OrderError::SameStatus(OrderStatus::Shipped))
        ));
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        for (from, to) in [
            (OrderStatus::Pending, OrderStatus::Delivered),
            (OrderStatus::Shipped, OrderStatus::Cancelled),
            (OrderStatus::Delivered, OrderStatus::Pending),
            (OrderStatus::Cancelled, OrderStatus::Confirmed),
        ] {
            assert!(
                matches!(
                    check_transition(from, to),
                    Err(OrderError::InvalidTransition { .. })
                ),
                "{from} -> {to} should be rejected"
            );
        }
    }

    #[test]
    fn test_payment_transitions() {
        check_payment_transition(PaymentStatus::Pending, PaymentStatus::Paid).unwrap();
        check_payment_transition(PaymentStatus::Paid, PaymentStatus::Refunded).unwrap();
        assert!(check_payment_transition(PaymentStatus::Refunded, PaymentStatus::Paid).is_err());
        assert!(matches!(
            check_payment_transition(PaymentStatus::Paid, PaymentStatus::Paid),
            Err(OrderError::SamePaymentStatus(_))
        ));
    }
}
