//! Coupon administration and discount preview.

use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::{Validate, ValidationError};

use bazaar_core::{CouponId, DiscountType};

use crate::db::{CartRepository, CouponRepository, coupons::CouponInput};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::{Cart, Coupon, CouponRejection};
use crate::response::{ApiResponse, Paginated};
use crate::state::AppState;
use crate::validation::ValidatedJson;

use super::PageQuery;

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_coupon"))]
pub struct CouponRequest {
    #[validate(length(min = 3, max = 50))]
    pub code: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub discount_type: DiscountType,
    #[validate(custom(function = "crate::validation::positive"))]
    pub value: Decimal,
    #[validate(custom(function = "crate::validation::non_negative"))]
    pub min_order_amount: Option<Decimal>,
    #[validate(custom(function = "crate::validation::positive"))]
    pub max_discount: Option<Decimal>,
    #[validate(range(min = 1))]
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

fn validate_coupon(coupon: &CouponRequest) -> std::result::Result<(), ValidationError> {
    if coupon.discount_type == DiscountType::Percentage && coupon.value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("value")
            .with_message("A percentage discount cannot exceed 100".into()));
    }
    if !coupon
        .code
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::new("code")
            .with_message("Codes may contain letters, digits, dashes and underscores".into()));
    }
    if let (Some(starts), Some(expires)) = (coupon.starts_at, coupon.expires_at)
        && expires <= starts
    {
        return Err(ValidationError::new("expires_at")
            .with_message("Coupon must expire after it starts".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct ValidateRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    /// Defaults to the shopper's current cart subtotal.
    #[validate(custom(function = "crate::validation::non_negative"))]
    pub subtotal: Option<Decimal>,
}

/// Discount a coupon would give, without using it.
#[derive(Debug, Serialize)]
pub struct CouponPreview {
    pub code: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub discounted_subtotal: Decimal,
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(paging): Query<PageQuery>,
) -> Result<ApiResponse<Paginated<Coupon>>> {
    let (coupons, total) = CouponRepository::new(state.pool())
        .list(paging.page())
        .await?;
    Ok(ApiResponse::ok(paging.paginate(coupons, total)))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CouponRequest>,
) -> Result<ApiResponse<Coupon>> {
    let code = Coupon::normalize_code(&body.code);
    let coupon = CouponRepository::new(state.pool())
        .create(&coupon_input(&body, &code))
        .await?;
    tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "Coupon created");
    Ok(ApiResponse::created(coupon))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
    ValidatedJson(body): ValidatedJson<CouponRequest>,
) -> Result<ApiResponse<Coupon>> {
    let code = Coupon::normalize_code(&body.code);
    let coupon = CouponRepository::new(state.pool())
        .update(id, &coupon_input(&body, &code))
        .await?;
    Ok(ApiResponse::ok(coupon))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
) -> Result<ApiResponse<()>> {
    CouponRepository::new(state.pool()).delete(id).await?;
    Ok(ApiResponse::message("Coupon deleted"))
}

/// Preview a coupon against a subtotal or the current cart.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn validate(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ValidateRequest>,
) -> Result<ApiResponse<CouponPreview>> {
    let subtotal = match body.subtotal {
        Some(subtotal) => subtotal,
        None => {
            let items = CartRepository::new(state.pool()).items(user.id).await?;
            Cart::from_items(items).subtotal
        }
    };

    let coupon = CouponRepository::new(state.pool())
        .get_by_code(&body.code)
        .await?
        .ok_or(CouponRejection::Unknown)
        .map_err(rejected)?;
    let discount = coupon.discount_for(subtotal, Utc::now()).map_err(rejected)?;

    Ok(ApiResponse::ok(CouponPreview {
        code: coupon.code,
        subtotal,
        discount,
        discounted_subtotal: subtotal - discount,
    }))
}

fn rejected(reason: CouponRejection) -> AppError {
    AppError::field("code", reason.to_string())
}

fn coupon_input<'a>(body: &'a CouponRequest, code: &'a str) -> CouponInput<'a> {
    CouponInput {
        code,
        description: body.description.as_deref(),
        discount_type: body.discount_type,
        value: body.value,
        min_order_amount: body.min_order_amount,
        max_discount: body.max_discount,
        usage_limit: body.usage_limit,
        starts_at: body.starts_at,
        expires_at: body.expires_at,
        is_active: body.is_active,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(discount_type: &str, value: &str) -> CouponRequest {
        serde_json::from_value(serde_json::json!({
            "code": "spring-25",
            "discount_type": discount_type,
            "value": value,
        }))
        .unwrap()
    }

    #[test]
    fn test_percentage_capped_at_hundred() {
        assert!(request("percentage", "25").validate().is_ok());
        assert!(request("percentage", "150").validate().is_err());
        assert!(request("fixed", "150").validate().is_ok());
    }

    #[test]
    fn test_code_characters() {
        let mut body = request("fixed", "5");
        body.code = "no spaces!".to_owned();
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_value_must_be_positive() {
        assert!(request("fixed", "0").validate().is_err());
    }
}
