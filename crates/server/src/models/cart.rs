//! Shopping cart types.

use rust_decimal::Decimal;
use serde::Serialize;

use bazaar_core::{CartItemId, ProductId, VariantId};

/// One cart line, joined with the product and variant it refers to.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub sku: String,
    pub image: Option<String>,
    pub quantity: i32,
    /// Price captured when the line was added or last updated.
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// A user's cart with derived totals.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub item_count: i64,
    pub subtotal: Decimal,
}

impl Cart {
    #[must_use]
    pub fn from_items(items: Vec<CartItem>) -> Self {
        let item_count = items.iter().map(|i| i64::from(i.quantity)).sum();
        let subtotal = items.iter().map(|i| i.line_total).sum();
        Self {
            items,
            item_count,
            subtotal,
        }
    }
}
