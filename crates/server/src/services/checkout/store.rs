//! Persistence seam for checkout.
//!
//! [`PgCheckoutStore::place_order`] writes the order, its items, the stock
//! decrements, the coupon use, the cart clear and the invoice in one
//! transaction. Any failure rolls all of it back.

use async_trait::async_trait;
use sqlx::PgPool;

use bazaar_core::{PaymentMethod, ProductId, UserId, VariantId};

use super::plan::{CartLine, CheckoutPlan};
use super::CheckoutError;
use crate::db::orders::{ORDER_COLUMNS, ORDER_ITEM_COLUMNS};
use crate::db::{CouponRepository, ProductRepository, RepositoryError};
use crate::models::{
    AddressSnapshot, Coupon, CouponRejection, Invoice, InvoiceLine, Order, OrderItem,
    OrderWithItems, Product, Variant,
};

/// A priced order ready to be written.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub order_number: String,
    pub invoice_number: String,
    pub shipping_address: AddressSnapshot,
    pub billing_address: AddressSnapshot,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub plan: CheckoutPlan,
}

/// The result of a successful checkout.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlacedOrder {
    pub order: OrderWithItems,
    pub invoice: Invoice,
}

/// Storage operations checkout needs.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Current cart lines with fresh product and variant records.
    ///
    /// A line whose product or variant row is gone is reported as
    /// `CheckoutError::Unavailable`.
    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, CheckoutError>;

    /// Coupon by code, ignoring case.
    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, RepositoryError>;

    /// Persist the order atomically.
    async fn place_order(&self, order: &NewOrder) -> Result<PlacedOrder, CheckoutError>;
}

/// `PostgreSQL` implementation of [`CheckoutStore`].
pub struct PgCheckoutStore<'a> {
    pool: &'a PgPool,
}

impl<'a> PgCheckoutStore<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
}

/// Pair a cart row with its catalog records.
fn cart_line(
    row: &CartRow,
    product: Option<Product>,
    variant: Option<Variant>,
) -> Result<CartLine, CheckoutError> {
    let missing = || CheckoutError::Unavailable {
        item: match row.variant_id {
            Some(id) => format!("variant {id} of product {}", row.product_id),
            None => format!("product {}", row.product_id),
        },
    };
    let product = product.ok_or_else(missing)?;
    let variant = match row.variant_id {
        Some(_) => Some(variant.ok_or_else(missing)?),
        None => None,
    };
    Ok(CartLine {
        product,
        variant,
        quantity: row.quantity,
    })
}

#[async_trait]
impl CheckoutStore for PgCheckoutStore<'_> {
    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, CheckoutError> {
        let rows = sqlx::query_as::<_, CartRow>(
            r"
            SELECT product_id, variant_id, quantity FROM shop.cart_items
            WHERE user_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let products = ProductRepository::new(self.pool);
        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            let product = products.get(row.product_id).await?;
            let variant = match (&product, row.variant_id) {
                (Some(_), Some(id)) => products.variant(row.product_id, id).await?,
                _ => None,
            };
            lines.push(cart_line(&row, product, variant)?);
        }
        Ok(lines)
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        CouponRepository::new(self.pool).get_by_code(code).await
    }

    async fn place_order(&self, new: &NewOrder) -> Result<PlacedOrder, CheckoutError> {
        let plan = &new.plan;
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r"
            INSERT INTO shop.orders
                (order_number, user_id, shipping_address, billing_address, subtotal, discount,
                 tax, shipping, total, coupon_code, payment_method, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(&new.order_number)
        .bind(new.user_id)
        .bind(sqlx::types::Json(&new.shipping_address))
        .bind(sqlx::types::Json(&new.billing_address))
        .bind(plan.subtotal)
        .bind(plan.discount)
        .bind(plan.tax)
        .bind(plan.shipping)
        .bind(plan.total)
        .bind(plan.coupon_code.as_deref())
        .bind(new.payment_method)
        .bind(new.notes.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        let mut items = Vec::with_capacity(plan.items.len());
        for item in &plan.items {
            let stored = sqlx::query_as::<_, OrderItem>(&format!(
                r"
                INSERT INTO shop.order_items
                    (order_id, product_id, variant_id, name, sku, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING {ORDER_ITEM_COLUMNS}
                "
            ))
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(&item.name)
            .bind(&item.sku)
            .bind(item.unit_price)
            .bind(item.quantity)
            .bind(item.line_total)
            .fetch_one(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

            // Guarded decrement: a concurrent checkout that took the stock
            // first makes this affect no row.
            let decremented = match item.variant_id {
                Some(variant_id) => sqlx::query(
                    r"
                    UPDATE shop.variants SET stock = stock - $2, updated_at = NOW()
                    WHERE id = $1 AND stock >= $2
                    ",
                )
                .bind(variant_id)
                .bind(item.quantity)
                .execute(&mut *tx)
                .await,
                None => sqlx::query(
                    r"
                    UPDATE shop.products SET stock = stock - $2, updated_at = NOW()
                    WHERE id = $1 AND stock >= $2
                    ",
                )
                .bind(item.product_id)
                .bind(item.quantity)
                .execute(&mut *tx)
                .await,
            }
            .map_err(RepositoryError::from)?;

            if decremented.rows_affected() == 0 {
                return Err(CheckoutError::StockChanged {
                    item: item.name.clone(),
                });
            }

            items.push(stored);
        }

        if let Some(code) = &plan.coupon_code {
            let used = sqlx::query(
                r"
                UPDATE shop.coupons SET usage_count = usage_count + 1, updated_at = NOW()
                WHERE code = $1 AND (usage_limit IS NULL OR usage_count < usage_limit)
                ",
            )
            .bind(code)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

            if used.rows_affected() == 0 {
                return Err(CheckoutError::Coupon(CouponRejection::UsageLimitReached));
            }
        }

        sqlx::query("DELETE FROM shop.cart_items WHERE user_id = $1")
            .bind(new.user_id)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        let invoice = insert_invoice(&mut tx, &order, &items, &new.invoice_number).await?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(PlacedOrder {
            order: OrderWithItems { order, items },
            invoice,
        })
    }
}

/// Invoice lines copied from stored order items.
#[must_use]
pub fn invoice_lines(items: &[OrderItem]) -> Vec<InvoiceLine> {
    items
        .iter()
        .map(|item| InvoiceLine {
            name: item.name.clone(),
            sku: item.sku.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            line_total: item.line_total,
        })
        .collect()
}

async fn insert_invoice(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order: &Order,
    items: &[OrderItem],
    invoice_number: &str,
) -> Result<Invoice, RepositoryError> {
    let invoice = sqlx::query_as::<_, Invoice>(
        r"
        INSERT INTO shop.invoices
            (invoice_number, order_id, user_id, items, shipping_address, billing_address,
             subtotal, discount, tax, shipping, total)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id, invoice_number, order_id, $12::text AS order_number, user_id, items,
                  shipping_address, billing_address, subtotal, discount, tax, shipping, total,
                  issued_at
        ",
    )
    .bind(invoice_number)
    .bind(order.id)
    .bind(order.user_id)
    .bind(sqlx::types::Json(invoice_lines(items)))
    .bind(sqlx::types::Json(&order.shipping_address))
    .bind(sqlx::types::Json(&order.billing_address))
    .bind(order.subtotal)
    .bind(order.discount)
    .bind(order.tax)
    .bind(order.shipping)
    .bind(order.total)
    .bind(&order.order_number)
    .fetch_one(&mut **tx)
    .await?;

    Ok(invoice)
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::Sku;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::catalog::tests::product;

    fn row(variant_id: Option<i32>) -> CartRow {
        CartRow {
            product_id: ProductId::new(7),
            variant_id: variant_id.map(VariantId::new),
            quantity: 2,
        }
    }

    fn variant(p: &Product) -> Variant {
        Variant {
            id: VariantId::new(3),
            product_id: p.id,
            name: "Large".to_owned(),
            sku: Sku::parse("SKU-7-L").unwrap(),
            price: None,
            stock: 4,
            attributes: serde_json::json!({}),
            is_active: true,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }

    #[test]
    fn test_cart_line_pairs_records() {
        let p = product(7, Decimal::new(1000, 2), 5);
        let v = variant(&p);
        let line = cart_line(&row(Some(3)), Some(p), Some(v)).unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.variant.unwrap().id, VariantId::new(3));
    }

    #[test]
    fn test_missing_product_is_unavailable() {
        let err = cart_line(&row(None), None, None).unwrap_err();
        assert!(
            matches!(&err, CheckoutError::Unavailable { item } if item == "product 7"),
            "{err:?}"
        );
    }

    #[test]
    fn test_missing_variant_is_unavailable() {
        let p = product(7, Decimal::new(1000, 2), 5);
        let err = cart_line(&row(Some(3)), Some(p), None).unwrap_err();
        assert!(
            matches!(&err, CheckoutError::Unavailable { item } if item == "variant 3 of product 7"),
            "{err:?}"
        );
    }
}
