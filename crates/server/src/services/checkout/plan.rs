//! Pure checkout planning: stock validation and pricing.
//!
//! Nothing here touches the database, so every pricing rule is covered by
//! plain unit tests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bazaar_core::{ProductId, VariantId, line_total, round_money};

use super::CheckoutError;
use crate::config::CheckoutConfig;
use crate::models::{Coupon, Product, Variant};

/// A cart line joined with the current product and variant records.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product: Product,
    pub variant: Option<Variant>,
    pub quantity: i32,
}

impl CartLine {
    fn display_name(&self) -> String {
        match &self.variant {
            Some(variant) => format!("{} ({})", self.product.name, variant.name),
            None => self.product.name.clone(),
        }
    }

    fn available_stock(&self) -> i32 {
        self.variant.as_ref().map_or(self.product.stock, |v| v.stock)
    }

    fn is_purchasable(&self) -> bool {
        self.product.is_active && self.variant.as_ref().is_none_or(|v| v.is_active)
    }
}

/// An order line as it will be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Everything needed to persist an order, with totals already computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub items: Vec<PlannedItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    /// Upper-case code of the applied coupon.
    pub coupon_code: Option<String>,
}

/// Validate stock and price the cart.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart`, `CheckoutError::Unavailable` or
/// `CheckoutError::InsufficientStock` for the first offending line, and
/// `CheckoutError::Coupon` when the coupon does not apply.
pub fn plan_checkout(
    lines: &[CartLine],
    coupon: Option<&Coupon>,
    config: &CheckoutConfig,
    now: DateTime<Utc>,
) -> Result<CheckoutPlan, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        if !line.is_purchasable() {
            return Err(CheckoutError::Unavailable {
                item: line.display_name(),
            });
        }
        let available = line.available_stock();
        let requested = u32::try_from(line.quantity).unwrap_or(0);
        if requested == 0 || available < line.quantity {
            return Err(CheckoutError::InsufficientStock {
                item: line.display_name(),
                available,
                requested: line.quantity,
            });
        }

        let (unit_price, sku) = match &line.variant {
            Some(variant) => (
                variant.effective_price(&line.product, now),
                variant.sku.as_str().to_owned(),
            ),
            None => (
                line.product.effective_price(now),
                line.product.sku.as_str().to_owned(),
            ),
        };
        let unit_price = round_money(unit_price);

        items.push(PlannedItem {
            product_id: line.product.id,
            variant_id: line.variant.as_ref().map(|v| v.id),
            name: line.display_name(),
            sku,
            unit_price,
            quantity: line.quantity,
            line_total: line_total(unit_price, requested),
        });
    }

    let subtotal: Decimal = items.iter().map(|i| i.line_total).sum();
    let discount = match coupon {
        Some(coupon) => coupon.discount_for(subtotal, now)?,
        None => Decimal::ZERO,
    };
    let tax = round_money((subtotal - discount) * config.tax_rate);
    let shipping = if subtotal > config.free_shipping_threshold {
        Decimal::ZERO
    } else {
        config.flat_shipping_fee
    };
    let total = round_money(subtotal - discount + tax + shipping);

    Ok(CheckoutPlan {
        items,
        subtotal,
        discount,
        tax,
        shipping,
        total,
        coupon_code: coupon.map(|c| c.code.clone()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use bazaar_core::{CouponId, DiscountType, Sku};

    use super::*;
    use crate::models::CouponRejection;
    use crate::models::catalog::tests::product;

    pub(crate) fn line(id: i32, price: Decimal, stock: i32, quantity: i32) -> CartLine {
        CartLine {
            product: product(id, price, stock),
            variant: None,
            quantity,
        }
    }

    pub(crate) fn coupon(discount_type: DiscountType, value: Decimal) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId::new(1),
            code: "SAVE".to_owned(),
            description: None,
            discount_type,
            value,
            min_order_amount: None,
            max_discount: None,
            usage_limit: None,
            usage_count: 0,
            starts_at: None,
            expires_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_totals_with_shipping_fee() {
        // 2 x 20.00 = 40.00; tax 4.00; shipping 10.00
        let plan = plan_checkout(
            &[line(1, Decimal::new(2000, 2), 5, 2)],
            None,
            &CheckoutConfig::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(plan.subtotal, Decimal::new(4000, 2));
        assert_eq!(plan.discount, Decimal::ZERO);
        assert_eq!(plan.tax, Decimal::new(400, 2));
        assert_eq!(plan.shipping, Decimal::new(1000, 2));
        assert_eq!(plan.total, Decimal::new(5400, 2));
    }

    #[test]
    fn test_free_shipping_only_above_threshold() {
        let config = CheckoutConfig::default();
        let at_threshold =
            plan_checkout(&[line(1, Decimal::from(100), 5, 1)], None, &config, Utc::now()).unwrap();
        assert_eq!(at_threshold.shipping, config.flat_shipping_fee);

        let above = plan_checkout(
            &[line(1, Decimal::new(10001, 2), 5, 1)],
            None,
            &config,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(above.shipping, Decimal::ZERO);
    }

    #[test]
    fn test_empty_cart_rejected() {
        let err = plan_checkout(&[], None, &CheckoutConfig::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[test]
    fn test_first_short_line_is_named() {
        let lines = [
            line(1, Decimal::from(5), 10, 1),
            line(2, Decimal::from(5), 1, 3),
            line(3, Decimal::from(5), 0, 1),
        ];
        let err = plan_checkout(&lines, None, &CheckoutConfig::default(), Utc::now()).unwrap_err();
        match err {
            CheckoutError::InsufficientStock {
                item,
                available,
                requested,
            } => {
                assert_eq!(item, "Product 2");
                assert_eq!(available, 1);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_inactive_product_rejected() {
        let mut l = line(1, Decimal::from(5), 10, 1);
        l.product.is_active = false;
        let err = plan_checkout(&[l], None, &CheckoutConfig::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, CheckoutError::Unavailable { .. }));
    }

    #[test]
    fn test_variant_stock_and_price_win() {
        let mut l = line(1, Decimal::from(20), 100, 2);
        l.variant = Some(Variant {
            id: VariantId::new(7),
            product_id: l.product.id,
            name: "Large".to_owned(),
            sku: Sku::parse("SKU-1-L").unwrap(),
            price: Some(Decimal::from(25)),
            stock: 1,
            attributes: serde_json::json!({}),
            is_active: true,
            created_at: l.product.created_at,
            updated_at: l.product.updated_at,
        });

        let err = plan_checkout(
            std::slice::from_ref(&l),
            None,
            &CheckoutConfig::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CheckoutError::InsufficientStock { available: 1, .. }));

        l.quantity = 1;
        let plan = plan_checkout(&[l], None, &CheckoutConfig::default(), Utc::now()).unwrap();
        let item = plan.items.first().unwrap();
        assert_eq!(item.unit_price, Decimal::from(25));
        assert_eq!(item.sku, "SKU-1-L");
        assert_eq!(item.name, "Product 1 (Large)");
        assert_eq!(item.variant_id, Some(VariantId::new(7)));
    }

    #[test]
    fn test_open_sale_price_is_charged() {
        let now = Utc::now();
        let mut l = line(1, Decimal::from(50), 10, 1);
        l.product.is_on_sale = true;
        l.product.sale_price = Some(Decimal::from(40));
        let plan = plan_checkout(&[l], None, &CheckoutConfig::default(), now).unwrap();
        assert_eq!(plan.subtotal, Decimal::from(40));
    }

    #[test]
    fn test_tax_is_computed_after_discount() {
        // 50.00 - 10% = 45.00; tax 4.50; shipping 10.00
        let c = coupon(DiscountType::Percentage, Decimal::from(10));
        let plan = plan_checkout(
            &[line(1, Decimal::from(50), 10, 1)],
            Some(&c),
            &CheckoutConfig::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(plan.discount, Decimal::from(5));
        assert_eq!(plan.tax, Decimal::new(450, 2));
        assert_eq!(plan.total, Decimal::new(5950, 2));
        assert_eq!(plan.coupon_code.as_deref(), Some("SAVE"));
    }

    #[test]
    fn test_fixed_discount_never_exceeds_subtotal() {
        let c = coupon(DiscountType::Fixed, Decimal::from(500));
        let plan = plan_checkout(
            &[line(1, Decimal::from(30), 10, 1)],
            Some(&c),
            &CheckoutConfig::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(plan.discount, plan.subtotal);
        assert_eq!(plan.tax, Decimal::ZERO);
        assert!(plan.total >= Decimal::ZERO);
    }

    #[test]
    fn test_rejected_coupon_stops_checkout() {
        let mut c = coupon(DiscountType::Fixed, Decimal::from(5));
        c.min_order_amount = Some(Decimal::from(100));
        let err = plan_checkout(
            &[line(1, Decimal::from(30), 10, 1)],
            Some(&c),
            &CheckoutConfig::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Coupon(CouponRejection::BelowMinimum { .. })
        ));
    }
}
