//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use bazaar_core::{Email, UserId, UserRole};

use super::User;

/// Session-stored user identity.
///
/// Role and active flag are re-checked against the database by the
/// extractors, so a demotion takes effect on the next request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
}

impl CurrentUser {
    /// Whether this user may use admin endpoints.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Session keys for authentication data.
pub mod session_keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
