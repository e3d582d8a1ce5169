//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] bazaar_core::EmailError),

    /// Wrong password or unknown email.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Bearer key is unknown, revoked, or its owner may no longer use it.
    #[error("invalid api key")]
    InvalidApiKey,

    /// The account has been deactivated by an admin.
    #[error("account is disabled")]
    AccountDisabled,

    /// Email already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
