//! API key repository. Only SHA-256 hashes of secrets are stored.

use sqlx::PgPool;

use bazaar_core::{ApiKeyId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::ApiKey;

const API_KEY_COLUMNS: &str =
    "id, user_id, name, key_prefix, last_used_at, revoked_at, created_at";

/// Repository for admin API keys.
pub struct ApiKeyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ApiKeyRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a hash collision.
    pub async fn create(
        &self,
        user_id: UserId,
        name: &str,
        key_prefix: &str,
        key_hash: &str,
    ) -> Result<ApiKey, RepositoryError> {
        let row = sqlx::query_as::<_, ApiKey>(&format!(
            r"
            INSERT INTO shop.api_keys (user_id, name, key_prefix, key_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {API_KEY_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(name)
        .bind(key_prefix)
        .bind(key_hash)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("api key already exists"))?;

        Ok(row)
    }

    /// List all keys, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<ApiKey>, RepositoryError> {
        let rows = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM shop.api_keys ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Revoke a key. Revoking twice keeps the first timestamp.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the key does not exist.
    pub async fn revoke(&self, id: ApiKeyId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.api_keys SET revoked_at = COALESCE(revoked_at, NOW()) WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Resolve an unrevoked key hash to its owner's user ID and record the use.
    ///
    /// The caller still checks the owner is active and an admin.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn authenticate(&self, key_hash: &str) -> Result<Option<UserId>, RepositoryError> {
        let owner = sqlx::query_scalar::<_, UserId>(
            r"
            UPDATE shop.api_keys SET last_used_at = NOW()
            WHERE key_hash = $1 AND revoked_at IS NULL
            RETURNING user_id
            ",
        )
        .bind(key_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(owner)
    }
}

