//! Checkout: turn a shopper's cart into an order and an invoice.
//!
//! Planning (stock validation and pricing) is pure and lives in [`plan`].
//! Writing goes through a [`CheckoutStore`] so the flow runs against
//! `PostgreSQL` in production and an in-memory store in tests.

mod plan;
mod store;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;
use validator::Validate;

use bazaar_core::{PaymentMethod, UserId};

use crate::config::CheckoutConfig;
use crate::db::RepositoryError;
use crate::models::{AddressSnapshot, CouponRejection};
use crate::services::numbering::{self, ORDER_PREFIX};

pub use plan::{CartLine, CheckoutPlan, PlannedItem, plan_checkout};
pub use store::{CheckoutStore, NewOrder, PgCheckoutStore, PlacedOrder, invoice_lines};

/// Why a checkout was rejected.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,

    #[error("{item} is no longer available")]
    Unavailable { item: String },

    #[error("only {available} of {item} in stock, {requested} requested")]
    InsufficientStock {
        item: String,
        available: i32,
        requested: i32,
    },

    /// Another checkout took the stock between planning and writing.
    #[error("{item} went out of stock while placing the order")]
    StockChanged { item: String },

    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Checkout request body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(nested)]
    pub shipping_address: AddressSnapshot,
    /// Defaults to the shipping address.
    #[validate(nested)]
    pub billing_address: Option<AddressSnapshot>,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 50))]
    pub coupon_code: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Run a checkout for `user_id`.
///
/// Validation failures return before anything is written.
///
/// # Errors
///
/// Returns `CheckoutError` if the cart is empty, a line is unavailable or
/// short on stock, the coupon does not apply, or the store fails.
#[instrument(skip(store, config, request), fields(user_id = %user_id))]
pub async fn checkout<S>(
    store: &S,
    config: &CheckoutConfig,
    user_id: UserId,
    request: CheckoutRequest,
    now: DateTime<Utc>,
) -> Result<PlacedOrder, CheckoutError>
where
    S: CheckoutStore + ?Sized,
{
    let lines = store.load_cart(user_id).await?;

    let coupon = match request.coupon_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(
            store
                .find_coupon(code)
                .await?
                .ok_or(CouponRejection::Unknown)?,
        ),
        _ => None,
    };

    let plan = plan_checkout(&lines, coupon.as_ref(), config, now)?;

    let order_number = numbering::reference_number(ORDER_PREFIX, now);
    let invoice_number = numbering::invoice_number_for(&order_number);
    let billing_address = request
        .billing_address
        .unwrap_or_else(|| request.shipping_address.clone());

    let placed = store
        .place_order(&NewOrder {
            user_id,
            order_number,
            invoice_number,
            shipping_address: request.shipping_address,
            billing_address,
            payment_method: request.payment_method,
            notes: request.notes,
            plan,
        })
        .await?;

    tracing::info!(
        order_number = %placed.order.order.order_number,
        total = %placed.order.order.total,
        "Order placed"
    );

    Ok(placed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use bazaar_core::{
        DiscountType, InvoiceId, OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId,
    };

    use super::plan::tests::{coupon, line};
    use super::*;
    use crate::models::{Coupon, Invoice, Order, OrderItem, OrderWithItems};

    /// Cart, stock and orders held in memory with the same all-or-nothing
    /// semantics as the `PostgreSQL` store.
    #[derive(Default)]
    struct MemoryStore {
        carts: Mutex<HashMap<UserId, Vec<CartLine>>>,
        coupons: Vec<Coupon>,
        stock: Mutex<HashMap<ProductId, i32>>,
        orders: Mutex<Vec<PlacedOrder>>,
    }

    impl MemoryStore {
        fn with_cart(user_id: UserId, lines: Vec<CartLine>) -> Self {
            let stock = lines
                .iter()
                .map(|l| (l.product.id, l.product.stock))
                .collect();
            Self {
                carts: Mutex::new(HashMap::from([(user_id, lines)])),
                stock: Mutex::new(stock),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl CheckoutStore for MemoryStore {
        async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, CheckoutError> {
            let stock = self.stock.lock().unwrap();
            let mut lines = self
                .carts
                .lock()
                .unwrap()
                .get(&user_id)
                .cloned()
                .unwrap_or_default();
            for line in &mut lines {
                if let Some(&current) = stock.get(&line.product.id) {
                    line.product.stock = current;
                }
            }
            Ok(lines)
        }

        async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
            let code = Coupon::normalize_code(code);
            Ok(self.coupons.iter().find(|c| c.code == code).cloned())
        }

        async fn place_order(&self, new: &NewOrder) -> Result<PlacedOrder, CheckoutError> {
            let mut stock = self.stock.lock().unwrap();
            let mut next = stock.clone();
            for item in &new.plan.items {
                let current = next.entry(item.product_id).or_insert(0);
                if *current < item.quantity {
                    return Err(CheckoutError::StockChanged {
                        item: item.name.clone(),
                    });
                }
                *current -= item.quantity;
            }
            *stock = next;

            let mut orders = self.orders.lock().unwrap();
            let order_id = OrderId::new(i32::try_from(orders.len()).unwrap() + 1);
            let now = Utc::now();
            let plan = &new.plan;
            let order = Order {
                id: order_id,
                order_number: new.order_number.clone(),
                user_id: new.user_id,
                shipping_address: new.shipping_address.clone(),
                billing_address: new.billing_address.clone(),
                subtotal: plan.subtotal,
                discount: plan.discount,
                tax: plan.tax,
                shipping: plan.shipping,
                total: plan.total,
                coupon_code: plan.coupon_code.clone(),
                payment_method: new.payment_method,
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Pending,
                tracking_number: None,
                notes: new.notes.clone(),
                created_at: now,
                updated_at: now,
            };
            let items: Vec<OrderItem> = plan
                .items
                .iter()
                .zip(1..)
                .map(|(item, id)| OrderItem {
                    id: OrderItemId::new(id),
                    order_id,
                    product_id: item.product_id,
                    variant_id: item.variant_id,
                    name: item.name.clone(),
                    sku: item.sku.clone(),
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                    line_total: item.line_total,
                })
                .collect();
            let invoice = Invoice {
                id: InvoiceId::new(order_id.as_i32()),
                invoice_number: new.invoice_number.clone(),
                order_id,
                order_number: order.order_number.clone(),
                user_id: order.user_id,
                items: invoice_lines(&items),
                shipping_address: order.shipping_address.clone(),
                billing_address: order.billing_address.clone(),
                subtotal: order.subtotal,
                discount: order.discount,
                tax: order.tax,
                shipping: order.shipping,
                total: order.total,
                issued_at: now,
            };

            self.carts.lock().unwrap().remove(&new.user_id);
            let placed = PlacedOrder {
                order: OrderWithItems { order, items },
                invoice,
            };
            orders.push(placed.clone());
            Ok(placed)
        }
    }

    fn address() -> AddressSnapshot {
        AddressSnapshot {
            recipient: "Ada Shopper".to_owned(),
            line1: "1 Market Street".to_owned(),
            line2: None,
            city: "Springfield".to_owned(),
            state: None,
            postal_code: "12345".to_owned(),
            country: "US".to_owned(),
            phone: None,
        }
    }

    fn request(coupon_code: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            shipping_address: address(),
            billing_address: None,
            payment_method: PaymentMethod::Card,
            coupon_code: coupon_code.map(str::to_owned),
            notes: None,
        }
    }

    fn user() -> UserId {
        UserId::new(42)
    }

    #[tokio::test]
    async fn test_successful_checkout_creates_one_order_and_invoice() {
        let store = MemoryStore::with_cart(
            user(),
            vec![
                line(1, Decimal::new(1250, 2), 10, 2),
                line(2, Decimal::from(5), 3, 3),
            ],
        );
        let config = CheckoutConfig::default();

        let placed = checkout(&store, &config, user(), request(None), Utc::now())
            .await
            .unwrap();

        let order = &placed.order.order;
        assert_eq!(order.subtotal, Decimal::from(40));
        assert_eq!(order.total, Decimal::from(54));
        assert_eq!(placed.invoice.total, order.total);
        assert_eq!(placed.invoice.subtotal, order.subtotal);
        assert_eq!(placed.invoice.items.len(), placed.order.items.len());
        assert_eq!(order.billing_address, order.shipping_address);
        assert!(order.order_number.starts_with("ORD-"));
        assert!(placed.invoice.invoice_number.starts_with("INV-"));

        assert_eq!(store.orders.lock().unwrap().len(), 1);
        assert!(store.load_cart(user()).await.unwrap().is_empty());
        let stock = store.stock.lock().unwrap();
        assert_eq!(stock.get(&ProductId::new(1)), Some(&8));
        assert_eq!(stock.get(&ProductId::new(2)), Some(&0));
    }

    #[tokio::test]
    async fn test_short_stock_creates_nothing() {
        let store = MemoryStore::with_cart(
            user(),
            vec![
                line(1, Decimal::from(10), 10, 1),
                line(2, Decimal::from(10), 2, 5),
            ],
        );

        let err = checkout(
            &store,
            &CheckoutConfig::default(),
            user(),
            request(None),
            Utc::now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CheckoutError::InsufficientStock { .. }));
        assert!(store.orders.lock().unwrap().is_empty());
        assert_eq!(store.load_cart(user()).await.unwrap().len(), 2);
        assert_eq!(store.stock.lock().unwrap().get(&ProductId::new(1)), Some(&10));
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let store = MemoryStore::default();
        let err = checkout(
            &store,
            &CheckoutConfig::default(),
            user(),
            request(None),
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_unknown_coupon_is_rejected() {
        let store = MemoryStore::with_cart(user(), vec![line(1, Decimal::from(10), 10, 1)]);
        let err = checkout(
            &store,
            &CheckoutConfig::default(),
            user(),
            request(Some("nope")),
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::Coupon(CouponRejection::Unknown)));
        assert!(store.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_coupon_code_is_case_insensitive() {
        let mut store = MemoryStore::with_cart(user(), vec![line(1, Decimal::from(200), 10, 1)]);
        store.coupons = vec![coupon(DiscountType::Fixed, Decimal::from(20))];

        let placed = checkout(
            &store,
            &CheckoutConfig::default(),
            user(),
            request(Some(" save ")),
            Utc::now(),
        )
        .await
        .unwrap();

        let order = &placed.order.order;
        assert_eq!(order.discount, Decimal::from(20));
        assert_eq!(order.shipping, Decimal::ZERO);
        assert_eq!(order.coupon_code.as_deref(), Some("SAVE"));
    }

    #[tokio::test]
    async fn test_stock_taken_concurrently_aborts() {
        let store = MemoryStore::with_cart(user(), vec![line(1, Decimal::from(10), 5, 5)]);
        let lines = store.load_cart(user()).await.unwrap();
        let plan = plan_checkout(&lines, None, &CheckoutConfig::default(), Utc::now()).unwrap();

        // Another shopper buys first.
        store.stock.lock().unwrap().insert(ProductId::new(1), 2);

        let err = store
            .place_order(&NewOrder {
                user_id: user(),
                order_number: "ORD-1".to_owned(),
                invoice_number: "INV-1".to_owned(),
                shipping_address: address(),
                billing_address: address(),
                payment_method: PaymentMethod::Card,
                notes: None,
                plan,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::StockChanged { .. }));
        assert!(store.orders.lock().unwrap().is_empty());
    }
}
