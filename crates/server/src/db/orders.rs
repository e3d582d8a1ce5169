//! Order and invoice repository.
//!
//! Orders are created only by checkout (see `services::checkout::store`);
//! this repository reads them and applies lifecycle updates.

use sqlx::PgPool;

use bazaar_core::{InvoiceId, OrderId, OrderStatus, PaymentStatus, UserId};

use super::{Page, RepositoryError};
use crate::models::{Invoice, Order, OrderItem, OrderWithItems};

pub(crate) const ORDER_COLUMNS: &str = "id, order_number, user_id, shipping_address, \
     billing_address, subtotal, discount, tax, shipping, total, coupon_code, payment_method, \
     status, payment_status, tracking_number, notes, created_at, updated_at";

pub(crate) const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, variant_id, name, sku, unit_price, quantity, line_total";

const INVOICE_SELECT: &str = r"
    SELECT i.id, i.invoice_number, i.order_id, o.order_number, i.user_id, i.items,
           i.shipping_address, i.billing_address, i.subtotal, i.discount, i.tax,
           i.shipping, i.total, i.issued_at
    FROM shop.invoices i
    JOIN shop.orders o ON o.id = i.order_id
";

/// Repository for orders, order items and invoices.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders, newest first. `user_id` restricts to one shopper.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: Option<UserId>,
        status: Option<OrderStatus>,
        page: Page,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM shop.orders
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(user_id)
        .bind(status)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM shop.orders
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((orders, total))
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// Item snapshots of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM shop.order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }

    /// Get an order together with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_with_items(
        &self,
        id: OrderId,
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        let Some(order) = self.get(id).await? else {
            return Ok(None);
        };
        let items = self.items(id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    /// Move an order from `from` to `to`, optionally recording a tracking
    /// number. Cancellation goes through [`Self::cancel`] instead.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the status changed since it
    /// was read.
    pub async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, Order>(&format!(
            r"
            UPDATE shop.orders
            SET status = $3,
                tracking_number = COALESCE($4, tracking_number),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(tracking_number)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("order status changed concurrently".to_owned()))
    }

    /// Cancel an order currently in `from` and put its items back in stock,
    /// in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the status changed since it
    /// was read.
    pub async fn cancel(&self, id: OrderId, from: OrderStatus) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r"
            UPDATE shop.orders SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(from)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("order status changed concurrently".to_owned()))?;

        // Variant lines restock the variant; plain lines restock the product.
        sqlx::query(
            r"
            UPDATE shop.variants v SET stock = v.stock + s.quantity, updated_at = NOW()
            FROM (
                SELECT variant_id, SUM(quantity)::int AS quantity FROM shop.order_items
                WHERE order_id = $1 AND variant_id IS NOT NULL
                GROUP BY variant_id
            ) s
            WHERE v.id = s.variant_id
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE shop.products p SET stock = p.stock + s.quantity, updated_at = NOW()
            FROM (
                SELECT product_id, SUM(quantity)::int AS quantity FROM shop.order_items
                WHERE order_id = $1 AND variant_id IS NULL
                GROUP BY product_id
            ) s
            WHERE p.id = s.product_id
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Move the payment status from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the payment status changed
    /// since it was read.
    pub async fn update_payment(
        &self,
        id: OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, Order>(&format!(
            r"
            UPDATE shop.orders SET payment_status = $3, updated_at = NOW()
            WHERE id = $1 AND payment_status = $2
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("payment status changed concurrently".to_owned()))
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    /// Get the invoice issued for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn invoice_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Invoice>, RepositoryError> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!("{INVOICE_SELECT} WHERE i.order_id = $1"))
            .bind(order_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(invoice)
    }

    /// Get an invoice by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!("{INVOICE_SELECT} WHERE i.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(invoice)
    }

    /// List invoices, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_invoices(&self, page: Page) -> Result<(Vec<Invoice>, i64), RepositoryError> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "{INVOICE_SELECT} ORDER BY i.issued_at DESC, i.id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shop.invoices")
            .fetch_one(self.pool)
            .await?;

        Ok((invoices, total))
    }
}
