//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_core::{AddressId, Email, UserId, UserRole};

/// A shopper or administrator account.
///
/// The password hash never leaves the repository layer.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A saved shipping address.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub label: Option<String>,
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}
