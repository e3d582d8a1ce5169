//! Order and invoice types.
//!
//! Orders store snapshots of items and addresses; nothing here follows live
//! product or address records after creation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use bazaar_core::{
    InvoiceId, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId,
    VariantId,
};

use super::Address;

/// Address captured on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AddressSnapshot {
    #[validate(length(min = 1, max = 200))]
    pub recipient: String,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    #[validate(length(max = 200))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(custom(function = "crate::validation::country_code"))]
    pub country: String,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
}

impl From<&Address> for AddressSnapshot {
    fn from(address: &Address) -> Self {
        Self {
            recipient: address.recipient.clone(),
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
            phone: address.phone.clone(),
        }
    }
}

/// A placed order. Totals are frozen at creation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    #[sqlx(json)]
    pub shipping_address: AddressSnapshot,
    #[sqlx(json)]
    pub billing_address: AddressSnapshot,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An item snapshot on an order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// An order with its items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Invoice line, denormalized from the order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub name: String,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Immutable billing document synthesized from an order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub order_id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    #[sqlx(json)]
    pub items: Vec<InvoiceLine>,
    #[sqlx(json)]
    pub shipping_address: AddressSnapshot,
    #[sqlx(json)]
    pub billing_address: AddressSnapshot,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub issued_at: DateTime<Utc>,
}
