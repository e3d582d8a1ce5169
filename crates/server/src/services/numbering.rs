//! Human-readable document numbers: `ORD-20260301-7KQ2MX`.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Characters used in the random suffix; no 0/O or 1/I.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const SUFFIX_LENGTH: usize = 6;

/// Order number prefix.
pub const ORDER_PREFIX: &str = "ORD";
/// Invoice number prefix.
pub const INVOICE_PREFIX: &str = "INV";
/// Ticket number prefix.
pub const TICKET_PREFIX: &str = "TKT";

/// A new number with `prefix`, the UTC date and a random suffix.
#[must_use]
pub fn reference_number(prefix: &str, now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LENGTH)
        .filter_map(|_| ALPHABET.get(rng.random_range(0..ALPHABET.len())))
        .map(|&b| char::from(b))
        .collect();
    format!("{prefix}-{}-{suffix}", now.format("%Y%m%d"))
}

/// The invoice number paired with an order number.
#[must_use]
pub fn invoice_number_for(order_number: &str) -> String {
    order_number
        .strip_prefix(ORDER_PREFIX)
        .map_or_else(
            || format!("{INVOICE_PREFIX}-{order_number}"),
            |rest| format!("{INVOICE_PREFIX}{rest}"),
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_reference_number_shape() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let number = reference_number(ORDER_PREFIX, now);
        assert!(number.starts_with("ORD-20260301-"));
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), SUFFIX_LENGTH);
        assert!(suffix.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_invoice_number_mirrors_order() {
        assert_eq!(invoice_number_for("ORD-20260301-ABC234"), "INV-20260301-ABC234");
        assert_eq!(invoice_number_for("legacy"), "INV-legacy");
    }
}
