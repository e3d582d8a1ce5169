//! Coupon repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::{CouponId, DiscountType};

use super::{Page, RepositoryError, conflict_on_unique};
use crate::models::Coupon;

pub(crate) const COUPON_COLUMNS: &str = "id, code, description, discount_type, value, \
     min_order_amount, max_discount, usage_limit, usage_count, starts_at, expires_at, is_active, \
     created_at, updated_at";

/// Coupon fields supplied on create and update. `code` is stored upper-case.
#[derive(Debug, Clone)]
pub struct CouponInput<'a> {
    pub code: &'a str,
    pub description: Option<&'a str>,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Repository for marketing coupons.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, page: Page) -> Result<(Vec<Coupon>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, Coupon>(&format!(
            r"
            SELECT {COUPON_COLUMNS} FROM shop.coupons
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shop.coupons")
            .fetch_one(self.pool)
            .await?;

        Ok((rows, total))
    }

    /// Find a coupon by code, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM shop.coupons WHERE code = $1"
        ))
        .bind(Coupon::normalize_code(code))
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Create a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create(&self, input: &CouponInput<'_>) -> Result<Coupon, RepositoryError> {
        let row = sqlx::query_as::<_, Coupon>(&format!(
            r"
            INSERT INTO shop.coupons
                (code, description, discount_type, value, min_order_amount, max_discount,
                 usage_limit, starts_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(Coupon::normalize_code(input.code))
        .bind(input.description)
        .bind(input.discount_type)
        .bind(input.value)
        .bind(input.min_order_amount)
        .bind(input.max_discount)
        .bind(input.usage_limit)
        .bind(input.starts_at)
        .bind(input.expires_at)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("coupon code already exists"))?;

        Ok(row)
    }

    /// Replace a coupon's fields. The usage count is kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        id: CouponId,
        input: &CouponInput<'_>,
    ) -> Result<Coupon, RepositoryError> {
        sqlx::query_as::<_, Coupon>(&format!(
            r"
            UPDATE shop.coupons
            SET code = $2, description = $3, discount_type = $4, value = $5,
                min_order_amount = $6, max_discount = $7, usage_limit = $8,
                starts_at = $9, expires_at = $10, is_active = $11, updated_at = NOW()
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(id)
        .bind(Coupon::normalize_code(input.code))
        .bind(input.description)
        .bind(input.discount_type)
        .bind(input.value)
        .bind(input.min_order_amount)
        .bind(input.max_discount)
        .bind(input.usage_limit)
        .bind(input.starts_at)
        .bind(input.expires_at)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("coupon code already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a coupon. Orders keep the code they were placed with.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if nothing was deleted.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.coupons WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
