//! Coupon type and discount rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use bazaar_core::{CouponId, DiscountType, percent_of, round_money};

/// A marketing discount code. Codes are stored upper-case.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a coupon does not apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("coupon code is not valid")]
    Unknown,
    #[error("coupon is no longer active")]
    Inactive,
    #[error("coupon is not valid yet")]
    NotStarted,
    #[error("coupon has expired")]
    Expired,
    #[error("coupon usage limit reached")]
    UsageLimitReached,
    #[error("order subtotal must be at least {minimum} to use this coupon")]
    BelowMinimum { minimum: Decimal },
}

impl Coupon {
    /// Normalize a user-entered code for lookup.
    #[must_use]
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Discount this coupon grants on `subtotal` at `now`.
    ///
    /// The result is capped by `max_discount` and never exceeds `subtotal`.
    ///
    /// # Errors
    ///
    /// Returns the first rule the coupon fails.
    pub fn discount_for(
        &self,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Decimal, CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if self.starts_at.is_some_and(|start| now < start) {
            return Err(CouponRejection::NotStarted);
        }
        if self.expires_at.is_some_and(|end| now >= end) {
            return Err(CouponRejection::Expired);
        }
        if self.usage_limit.is_some_and(|limit| self.usage_count >= limit) {
            return Err(CouponRejection::UsageLimitReached);
        }
        if let Some(minimum) = self.min_order_amount
            && subtotal < minimum
        {
            return Err(CouponRejection::BelowMinimum { minimum });
        }

        let raw = match self.discount_type {
            DiscountType::Percentage => percent_of(subtotal, self.value),
            DiscountType::Fixed => self.value,
        };
        let capped = self.max_discount.map_or(raw, |cap| raw.min(cap));
        Ok(round_money(capped.min(subtotal).max(Decimal::ZERO)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn coupon(discount_type: DiscountType, value: Decimal) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId::new(1),
            code: "WELCOME".to_owned(),
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
    fn test_percentage_discount() {
        let c = coupon(DiscountType::Percentage, Decimal::from(15));
        assert_eq!(
            c.discount_for(Decimal::new(8000, 2), Utc::now()).unwrap(),
            Decimal::new(1200, 2)
        );
    }

    #[test]
    fn test_percentage_capped_by_max_discount() {
        let mut c = coupon(DiscountType::Percentage, Decimal::from(50));
        c.max_discount = Some(Decimal::from(20));
        assert_eq!(
            c.discount_for(Decimal::from(100), Utc::now()).unwrap(),
            Decimal::from(20)
        );
    }

    #[test]
    fn test_fixed_never_exceeds_subtotal() {
        let c = coupon(DiscountType::Fixed, Decimal::from(50));
        assert_eq!(
            c.discount_for(Decimal::new(3050, 2), Utc::now()).unwrap(),
            Decimal::new(3050, 2)
        );
    }

    #[test]
    fn test_rejections() {
        let now = Utc::now();
        let subtotal = Decimal::from(40);

        let mut c = coupon(DiscountType::Fixed, Decimal::from(5));
        c.is_active = false;
        assert_eq!(c.discount_for(subtotal, now), Err(CouponRejection::Inactive));

        let mut c = coupon(DiscountType::Fixed, Decimal::from(5));
        c.starts_at = Some(now + Duration::hours(1));
        assert_eq!(c.discount_for(subtotal, now), Err(CouponRejection::NotStarted));

        let mut c = coupon(DiscountType::Fixed, Decimal::from(5));
        c.expires_at = Some(now);
        assert_eq!(c.discount_for(subtotal, now), Err(CouponRejection::Expired));

        let mut c = coupon(DiscountType::Fixed, Decimal::from(5));
        c.usage_limit = Some(3);
        c.usage_count = 3;
        assert_eq!(
            c.discount_for(subtotal, now),
            Err(CouponRejection::UsageLimitReached)
        );

        let mut c = coupon(DiscountType::Fixed, Decimal::from(5));
        c.min_order_amount = Some(Decimal::from(50));
        assert_eq!(
            c.discount_for(subtotal, now),
            Err(CouponRejection::BelowMinimum {
                minimum: Decimal::from(50)
            })
        );
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(Coupon::normalize_code("  summer10 "), "SUMMER10");
    }
}
