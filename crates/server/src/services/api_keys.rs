//! Admin API keys: `bzr_` followed by 64 hex characters.
//!
//! Only the SHA-256 hash is stored. The first characters are kept as a
//! prefix so admins can tell keys apart in listings.

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::instrument;

use bazaar_core::{ApiKeyId, UserId};

use crate::db::{ApiKeyRepository, RepositoryError, UserRepository};
use crate::models::{ApiKey, CreatedApiKey, User};
use crate::services::auth::AuthError;

/// Every key starts with this.
pub const KEY_PREFIX: &str = "bzr_";

const SECRET_BYTES: usize = 32;

/// Characters of the key stored in clear for display.
const DISPLAY_PREFIX_LENGTH: usize = 12;

/// A freshly generated key.
#[derive(Debug)]
pub struct GeneratedKey {
    pub secret: String,
    pub prefix: String,
    pub hash: String,
}

/// Generate a new random key.
#[must_use]
pub fn generate_key() -> GeneratedKey {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill(&mut bytes);
    let secret = format!("{KEY_PREFIX}{}", hex::encode(bytes));
    let prefix = secret.chars().take(DISPLAY_PREFIX_LENGTH).collect();
    let hash = hash_key(&secret);
    GeneratedKey {
        secret,
        prefix,
        hash,
    }
}

/// Hex SHA-256 of a key.
#[must_use]
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Whether `key` has the shape of a Bazaar key.
#[must_use]
pub fn is_well_formed(key: &str) -> bool {
    key.strip_prefix(KEY_PREFIX).is_some_and(|rest| {
        rest.len() == SECRET_BYTES * 2 && rest.bytes().all(|b| b.is_ascii_hexdigit())
    })
}

/// Whether the owner of a key may still use it.
#[must_use]
pub const fn owner_is_eligible(owner: &User) -> bool {
    owner.is_active && owner.role.is_admin()
}

/// API key management and bearer authentication.
pub struct ApiKeyService<'a> {
    keys: ApiKeyRepository<'a>,
    users: UserRepository<'a>,
}

impl<'a> ApiKeyService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            keys: ApiKeyRepository::new(pool),
            users: UserRepository::new(pool),
        }
    }

    /// Create a key for `owner`. The plaintext is only in the return value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the insert fails.
    #[instrument(skip(self, name))]
    pub async fn create(&self, owner: UserId, name: &str) -> Result<CreatedApiKey, RepositoryError> {
        let generated = generate_key();
        let key = self
            .keys
            .create(owner, name.trim(), &generated.prefix, &generated.hash)
            .await?;
        tracing::info!(api_key_id = %key.id, prefix = %key.key_prefix, "API key created");
        Ok(CreatedApiKey {
            key,
            secret: generated.secret,
        })
    }

    /// All keys, without secrets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn list(&self) -> Result<Vec<ApiKey>, RepositoryError> {
        self.keys.list().await
    }

    /// Revoke a key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown key.
    #[instrument(skip(self))]
    pub async fn revoke(&self, id: ApiKeyId) -> Result<(), RepositoryError> {
        self.keys.revoke(id).await?;
        tracing::info!(api_key_id = %id, "API key revoked");
        Ok(())
    }

    /// Resolve a bearer key to its owner.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidApiKey` for malformed, unknown or revoked
    /// keys and for owners that are deactivated or no longer admins.
    pub async fn authenticate(&self, key: &str) -> Result<User, AuthError> {
        if !is_well_formed(key) {
            return Err(AuthError::InvalidApiKey);
        }

        let owner_id = self
            .keys
            .authenticate(&hash_key(key))
            .await?
            .ok_or(AuthError::InvalidApiKey)?;

        let owner = self
            .users
            .get_by_id(owner_id)
            .await?
            .filter(owner_is_eligible)
            .ok_or(AuthError::InvalidApiKey)?;

        Ok(owner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{Email, UserRole};
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_generated_key_shape() {
        let key = generate_key();
        assert!(key.secret.starts_with(KEY_PREFIX));
        assert_eq!(key.secret.len(), KEY_PREFIX.len() + 64);
        assert!(is_well_formed(&key.secret));
        assert!(key.secret.starts_with(&key.prefix));
        assert_eq!(key.prefix.len(), DISPLAY_PREFIX_LENGTH);
    }

    #[test]
    fn test_hash_is_stable_and_not_the_secret() {
        let key = generate_key();
        assert_eq!(key.hash, hash_key(&key.secret));
        assert_eq!(key.hash.len(), 64);
        assert_ne!(key.hash, key.secret);
    }

    #[test]
    fn test_keys_are_unique() {
        assert_ne!(generate_key().secret, generate_key().secret);
    }

    #[test]
    fn test_malformed_keys_rejected() {
        assert!(!is_well_formed("bzr_short"));
        assert!(!is_well_formed(&format!("xyz_{}", "a".repeat(64))));
        assert!(!is_well_formed(&format!("bzr_{}", "g".repeat(64))));
    }

    #[test]
    fn test_owner_eligibility() {
        let now = Utc::now();
        let mut owner = User {
            id: UserId::new(1),
            name: "Admin".to_owned(),
            email: Email::parse("admin@example.com").unwrap(),
            role: UserRole::Admin,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(owner_is_eligible(&owner));

        owner.role = UserRole::User;
        assert!(!owner_is_eligible(&owner));

        owner.role = UserRole::Admin;
        owner.is_active = false;
        assert!(!owner_is_eligible(&owner));
    }
}
