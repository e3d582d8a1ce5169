//! Request validation: a validating JSON extractor and shared field rules.

use std::borrow::Cow;

use axum::{
    Json,
    extract::{FromRequest, Request},
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use bazaar_core::{Sku, Slug};

use crate::error::AppError;

/// JSON body that has passed `validator` rules.
///
/// Malformed JSON is a 400 with the parser message; rule failures are a 400
/// with per-field messages.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Canonical slug (`[a-z0-9-]`, no leading, trailing or doubled dashes).
pub fn slug(value: &str) -> Result<(), ValidationError> {
    Slug::parse(value)
        .map(|_| ())
        .map_err(|_| invalid("slug", "must be lowercase letters, digits and single dashes"))
}

/// SKU characters and length.
pub fn sku(value: &str) -> Result<(), ValidationError> {
    Sku::parse(value)
        .map(|_| ())
        .map_err(|_| invalid("sku", "must be letters, digits, '-', '_' or '.'"))
}

/// Money amount that may be zero.
pub fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(invalid("range", "cannot be negative"));
    }
    Ok(())
}

/// Money amount strictly above zero.
pub fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(invalid("range", "must be greater than zero"));
    }
    Ok(())
}

/// ISO 3166-1 alpha-2 country code, upper case.
pub fn country_code(value: &str) -> Result<(), ValidationError> {
    if value.len() == 2 && value.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(invalid("country", "must be a two-letter upper-case country code"))
    }
}

/// Every entry is a valid country code.
pub fn country_codes(values: &[String]) -> Result<(), ValidationError> {
    if values.is_empty() {
        return Err(invalid("length", "at least one country is required"));
    }
    values.iter().try_for_each(|c| country_code(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_rule() {
        assert!(slug("summer-sale").is_ok());
        assert!(slug("Summer Sale").is_err());
        assert!(slug("-edge").is_err());
    }

    #[test]
    fn test_money_rules() {
        assert!(non_negative(&Decimal::ZERO).is_ok());
        assert!(non_negative(&Decimal::new(-1, 2)).is_err());
        assert!(positive(&Decimal::ZERO).is_err());
        assert!(positive(&Decimal::new(1, 2)).is_ok());
    }

    #[test]
    fn test_country_rules() {
        assert!(country_code("US").is_ok());
        assert!(country_code("us").is_err());
        assert!(country_code("USA").is_err());
        assert!(country_codes(&[]).is_err());
        assert!(country_codes(&["DE".to_owned(), "FR".to_owned()]).is_ok());
    }
}
