//! Decimal money arithmetic.
//!
//! All monetary amounts are `rust_decimal::Decimal` in the store currency's
//! standard unit (dollars, not cents). Rounding is half away from zero to two
//! decimal places, applied at the line, tax and total level.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept for money.
pub const MONEY_SCALE: u32 = 2;

/// Round an amount to cents, half away from zero.
///
/// ```
/// use bazaar_core::round_money;
/// use rust_decimal::Decimal;
///
/// assert_eq!(round_money(Decimal::new(10_005, 3)), Decimal::new(1001, 2));
/// ```
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Price of `quantity` units at `unit_price`, rounded to cents.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    round_money(unit_price * Decimal::from(quantity))
}

/// `percent`% of `amount`, rounded to cents.
#[must_use]
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    round_money(amount * percent / Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_midpoint() {
        assert_eq!(round_money(Decimal::new(2_345, 3)), Decimal::new(235, 2));
        assert_eq!(round_money(Decimal::new(-2_345, 3)), Decimal::new(-235, 2));
        assert_eq!(round_money(Decimal::new(2_344, 3)), Decimal::new(234, 2));
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(Decimal::new(1999, 2), 3), Decimal::new(5997, 2));
        assert_eq!(line_total(Decimal::new(1999, 2), 0), Decimal::ZERO);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(
            percent_of(Decimal::new(8050, 2), Decimal::from(15)),
            Decimal::new(1208, 2)
        );
    }
}
