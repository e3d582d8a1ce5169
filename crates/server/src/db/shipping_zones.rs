//! Shipping zone repository.

use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::ShippingZoneId;

use super::RepositoryError;
use crate::models::ShippingZone;

const ZONE_COLUMNS: &str = "id, name, countries, rate, free_shipping_threshold, \
                            estimated_days_min, estimated_days_max, is_active, created_at";

/// Zone fields supplied on create and update. Countries are upper-case
/// ISO codes.
#[derive(Debug, Clone)]
pub struct ShippingZoneInput<'a> {
    pub name: &'a str,
    pub countries: &'a [String],
    pub rate: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub estimated_days_min: Option<i32>,
    pub estimated_days_max: Option<i32>,
    pub is_active: bool,
}

/// Repository for shipping zones.
pub struct ShippingZoneRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingZoneRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all zones by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<ShippingZone>, RepositoryError> {
        let rows = sqlx::query_as::<_, ShippingZone>(&format!(
            "SELECT {ZONE_COLUMNS} FROM shop.shipping_zones ORDER BY name, id"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// The first active zone (lowest ID) that lists `country`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_for_country(
        &self,
        country: &str,
    ) -> Result<Option<ShippingZone>, RepositoryError> {
        let row = sqlx::query_as::<_, ShippingZone>(&format!(
            r"
            SELECT {ZONE_COLUMNS} FROM shop.shipping_zones
            WHERE is_active AND $1 = ANY(countries)
            ORDER BY id
            LIMIT 1
            "
        ))
        .bind(country.to_ascii_uppercase())
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Create a zone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        input: &ShippingZoneInput<'_>,
    ) -> Result<ShippingZone, RepositoryError> {
        let row = sqlx::query_as::<_, ShippingZone>(&format!(
            r"
            INSERT INTO shop.shipping_zones
                (name, countries, rate, free_shipping_threshold, estimated_days_min,
                 estimated_days_max, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ZONE_COLUMNS}
            "
        ))
        .bind(input.name)
        .bind(input.countries)
        .bind(input.rate)
        .bind(input.free_shipping_threshold)
        .bind(input.estimated_days_min)
        .bind(input.estimated_days_max)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// Replace a zone's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the zone does not exist.
    pub async fn update(
        &self,
        id: ShippingZoneId,
        input: &ShippingZoneInput<'_>,
    ) -> Result<ShippingZone, RepositoryError> {
        sqlx::query_as::<_, ShippingZone>(&format!(
            r"
            UPDATE shop.shipping_zones
            SET name = $2, countries = $3, rate = $4, free_shipping_threshold = $5,
                estimated_days_min = $6, estimated_days_max = $7, is_active = $8
            WHERE id = $1
            RETURNING {ZONE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name)
        .bind(input.countries)
        .bind(input.rate)
        .bind(input.free_shipping_threshold)
        .bind(input.estimated_days_min)
        .bind(input.estimated_days_max)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a zone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if nothing was deleted.
    pub async fn delete(&self, id: ShippingZoneId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.shipping_zones WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
