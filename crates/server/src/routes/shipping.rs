//! Shipping zones and public shipping quotes.

use axum::extract::{Path, Query, State};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;
use validator::{Validate, ValidationError};

use bazaar_core::ShippingZoneId;

use crate::db::{ShippingZoneRepository, shipping_zones::ShippingZoneInput};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{ShippingQuote, ShippingZone};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validation::ValidatedJson;

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_zone"))]
pub struct ZoneRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom(function = "crate::validation::country_codes"))]
    pub countries: Vec<String>,
    #[validate(custom(function = "crate::validation::non_negative"))]
    pub rate: Decimal,
    #[validate(custom(function = "crate::validation::non_negative"))]
    pub free_shipping_threshold: Option<Decimal>,
    #[validate(range(min = 0))]
    pub estimated_days_min: Option<i32>,
    #[validate(range(min = 0))]
    pub estimated_days_max: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

fn validate_zone(zone: &ZoneRequest) -> std::result::Result<(), ValidationError> {
    if let (Some(min), Some(max)) = (zone.estimated_days_min, zone.estimated_days_max)
        && max < min
    {
        return Err(ValidationError::new("estimated_days")
            .with_message("Maximum delivery days must not be below the minimum".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub country: String,
    pub subtotal: Decimal,
}

/// Sorted, de-duplicated country codes.
fn normalize_countries(countries: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = countries
        .iter()
        .map(|c| c.trim().to_owned())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<ShippingZone>>> {
    let zones = ShippingZoneRepository::new(state.pool()).list().await?;
    Ok(ApiResponse::ok(zones))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ZoneRequest>,
) -> Result<ApiResponse<ShippingZone>> {
    let countries = normalize_countries(&body.countries);
    let zone = ShippingZoneRepository::new(state.pool())
        .create(&zone_input(&body, &countries))
        .await?;
    tracing::info!(zone_id = %zone.id, "Shipping zone created");
    Ok(ApiResponse::created(zone))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ShippingZoneId>,
    ValidatedJson(body): ValidatedJson<ZoneRequest>,
) -> Result<ApiResponse<ShippingZone>> {
    let countries = normalize_countries(&body.countries);
    let zone = ShippingZoneRepository::new(state.pool())
        .update(id, &zone_input(&body, &countries))
        .await?;
    Ok(ApiResponse::ok(zone))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ShippingZoneId>,
) -> Result<ApiResponse<()>> {
    ShippingZoneRepository::new(state.pool()).delete(id).await?;
    Ok(ApiResponse::message("Shipping zone deleted"))
}

/// Rate of the active zone covering `country`.
#[instrument(skip(state))]
pub async fn quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<ApiResponse<ShippingQuote>> {
    let country = query.country.trim().to_ascii_uppercase();
    crate::validation::country_code(&country)
        .map_err(|_| AppError::field("country", "Use a two-letter country code"))?;
    if query.subtotal.is_sign_negative() {
        return Err(AppError::field("subtotal", "Subtotal cannot be negative"));
    }

    let zone = ShippingZoneRepository::new(state.pool())
        .find_for_country(&country)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("We do not ship to {country} yet")))?;
    Ok(ApiResponse::ok(zone.quote(query.subtotal)))
}

fn zone_input<'a>(body: &'a ZoneRequest, countries: &'a [String]) -> ShippingZoneInput<'a> {
    ShippingZoneInput {
        name: body.name.trim(),
        countries,
        rate: body.rate,
        free_shipping_threshold: body.free_shipping_threshold,
        estimated_days_min: body.estimated_days_min,
        estimated_days_max: body.estimated_days_max,
        is_active: body.is_active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_countries() {
        let countries = vec!["US".to_owned(), "CA".to_owned(), "US".to_owned()];
        assert_eq!(normalize_countries(&countries), vec!["CA", "US"]);
    }
}
