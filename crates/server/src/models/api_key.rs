//! API key metadata. The secret itself is only returned once, at creation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_core::{ApiKeyId, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub user_id: UserId,
    pub name: String,
    pub key_prefix: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Response for a newly created key.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedApiKey {
    #[serde(flatten)]
    pub key: ApiKey,
    /// Plaintext key; not stored and not retrievable later.
    pub secret: String,
}
