//! Saved address repository.

use sqlx::PgPool;

use bazaar_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::Address;

const ADDRESS_COLUMNS: &str = "id, user_id, label, recipient, line1, line2, city, state, \
                               postal_code, country, phone, is_default, created_at";

/// Fields of an address as submitted by the owner.
#[derive(Debug, Clone)]
pub struct AddressInput<'a> {
    pub label: Option<&'a str>,
    pub recipient: &'a str,
    pub line1: &'a str,
    pub line2: Option<&'a str>,
    pub city: &'a str,
    pub state: Option<&'a str>,
    pub postal_code: &'a str,
    pub country: &'a str,
    pub phone: Option<&'a str>,
    pub is_default: bool,
}

/// Repository for per-user saved addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, Address>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS} FROM shop.addresses
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create an address. A new default clears the previous default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput<'_>,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            r"
            INSERT INTO shop.addresses
                (user_id, label, recipient, line1, line2, city, state, postal_code, country, phone, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(input.label)
        .bind(input.recipient)
        .bind(input.line1)
        .bind(input.line2)
        .bind(input.city)
        .bind(input.state)
        .bind(input.postal_code)
        .bind(input.country)
        .bind(input.phone)
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Replace an address owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not exist or
    /// belongs to someone else.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput<'_>,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            r"
            UPDATE shop.addresses
            SET label = $3, recipient = $4, line1 = $5, line2 = $6, city = $7, state = $8,
                postal_code = $9, country = $10, phone = $11, is_default = $12
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.label)
        .bind(input.recipient)
        .bind(input.line1)
        .bind(input.line2)
        .bind(input.city)
        .bind(input.state)
        .bind(input.postal_code)
        .bind(input.country)
        .bind(input.phone)
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(address)
    }

    /// Delete an address owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if nothing was deleted.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

async fn clear_default(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: UserId,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE shop.addresses SET is_default = FALSE WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
