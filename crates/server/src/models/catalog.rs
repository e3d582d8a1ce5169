//! Catalog domain types: categories, products and variants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use bazaar_core::{CategoryId, ProductId, Sku, Slug, VariantId};

/// A product category. Categories nest through `parent_id`.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: Slug,
    pub sku: Sku,
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub sale_starts_at: Option<DateTime<Utc>>,
    pub sale_ends_at: Option<DateTime<Utc>>,
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    pub is_active: bool,
    pub is_featured: bool,
    pub is_on_sale: bool,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether the sale price applies at `now`.
    ///
    /// The window is half-open: `[sale_starts_at, sale_ends_at)`. A missing
    /// bound is unbounded on that side.
    #[must_use]
    pub fn sale_is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_on_sale
            && self.sale_price.is_some()
            && self.sale_starts_at.is_none_or(|start| start <= now)
            && self.sale_ends_at.is_none_or(|end| now < end)
    }

    /// The price charged at `now`.
    #[must_use]
    pub fn effective_price(&self, now: DateTime<Utc>) -> Decimal {
        match self.sale_price {
            Some(sale) if self.sale_is_open(now) => sale,
            _ => self.price,
        }
    }
}

/// A purchasable configuration of a product, with its own SKU and stock.
#[derive(Debug, Clone, Serialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub sku: Sku,
    /// Overrides the product's effective price when set.
    pub price: Option<Decimal>,
    pub stock: i32,
    pub attributes: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Variant {
    /// The price charged at `now` for this variant of `product`.
    #[must_use]
    pub fn effective_price(&self, product: &Product, now: DateTime<Utc>) -> Decimal {
        self.price.unwrap_or_else(|| product.effective_price(now))
    }
}

/// A product with its current price and, on detail views, its variants.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub effective_price: Decimal,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<Variant>,
}

impl ProductDetail {
    #[must_use]
    pub fn new(product: Product, variants: Vec<Variant>, now: DateTime<Utc>) -> Self {
        Self {
            effective_price: product.effective_price(now),
            product,
            variants,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    pub(crate) fn product(id: i32, price: Decimal, stock: i32) -> Product {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: Slug::parse(&format!("product-{id}")).unwrap(),
            sku: Sku::parse(&format!("SKU-{id}")).unwrap(),
            description: None,
            price,
            compare_at_price: None,
            sale_price: None,
            sale_starts_at: None,
            sale_ends_at: None,
            stock,
            category_id: None,
            is_active: true,
            is_featured: false,
            is_on_sale: false,
            images: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_effective_price_without_sale() {
        let p = product(1, Decimal::new(2500, 2), 5);
        assert_eq!(p.effective_price(Utc::now()), Decimal::new(2500, 2));
    }

    #[test]
    fn test_effective_price_inside_and_outside_window() {
        let now = Utc::now();
        let mut p = product(1, Decimal::new(2500, 2), 5);
        p.is_on_sale = true;
        p.sale_price = Some(Decimal::new(1999, 2));
        p.sale_starts_at = Some(now - Duration::days(1));
        p.sale_ends_at = Some(now + Duration::days(1));
        assert_eq!(p.effective_price(now), Decimal::new(1999, 2));

        assert_eq!(p.effective_price(now + Duration::days(2)), Decimal::new(2500, 2));
        assert_eq!(p.effective_price(now - Duration::days(2)), Decimal::new(2500, 2));
    }

    #[test]
    fn test_sale_flag_required() {
        let mut p = product(1, Decimal::new(2500, 2), 5);
        p.sale_price = Some(Decimal::new(1000, 2));
        assert_eq!(p.effective_price(Utc::now()), Decimal::new(2500, 2));
    }

    #[test]
    fn test_variant_override_wins() {
        let p = product(1, Decimal::new(2500, 2), 5);
        let v = Variant {
            id: VariantId::new(9),
            product_id: p.id,
            name: "Large".to_owned(),
            sku: Sku::parse("SKU-1-L").unwrap(),
            price: Some(Decimal::new(2900, 2)),
            stock: 3,
            attributes: serde_json::json!({"size": "L"}),
            is_active: true,
            created_at: p.created_at,
            updated_at: p.updated_at,
        };
        assert_eq!(v.effective_price(&p, Utc::now()), Decimal::new(2900, 2));
    }
}
