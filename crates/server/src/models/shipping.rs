//! Shipping zones and quotes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use bazaar_core::ShippingZoneId;

/// A flat shipping rate for a set of countries.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ShippingZone {
    pub id: ShippingZoneId,
    pub name: String,
    pub countries: Vec<String>,
    pub rate: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub estimated_days_min: Option<i32>,
    pub estimated_days_max: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingQuote {
    pub zone_id: ShippingZoneId,
    pub zone_name: String,
    pub rate: Decimal,
    pub is_free: bool,
    pub estimated_days_min: Option<i32>,
    pub estimated_days_max: Option<i32>,
}

impl ShippingZone {
    /// Whether this zone ships to `country` (ISO alpha-2).
    #[must_use]
    pub fn covers(&self, country: &str) -> bool {
        self.countries.iter().any(|c| c.eq_ignore_ascii_case(country))
    }

    /// Quote for an order with `subtotal`. Free above the zone threshold.
    #[must_use]
    pub fn quote(&self, subtotal: Decimal) -> ShippingQuote {
        let is_free = self
            .free_shipping_threshold
            .is_some_and(|threshold| subtotal > threshold);
        ShippingQuote {
            zone_id: self.id,
            zone_name: self.name.clone(),
            rate: if is_free { Decimal::ZERO } else { self.rate },
            is_free,
            estimated_days_min: self.estimated_days_min,
            estimated_days_max: self.estimated_days_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> ShippingZone {
        ShippingZone {
            id: ShippingZoneId::new(1),
            name: "Europe".to_owned(),
            countries: vec!["DE".to_owned(), "FR".to_owned()],
            rate: Decimal::new(1250, 2),
            free_shipping_threshold: Some(Decimal::from(150)),
            estimated_days_min: Some(3),
            estimated_days_max: Some(7),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_covers_is_case_insensitive() {
        assert!(zone().covers("fr"));
        assert!(!zone().covers("US"));
    }

    #[test]
    fn test_quote_threshold() {
        let z = zone();
        assert_eq!(z.quote(Decimal::from(150)).rate, Decimal::new(1250, 2));
        let free = z.quote(Decimal::new(15001, 2));
        assert!(free.is_free);
        assert_eq!(free.rate, Decimal::ZERO);
    }
}
