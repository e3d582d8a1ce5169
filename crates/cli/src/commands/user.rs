//! User management commands.
//!
//! Shoppers register through the API; these commands exist to bootstrap the
//! first admin and to promote existing accounts.

use bazaar_core::{Email, UserRole};
use bazaar_server::db::{RepositoryError, UserRepository};
use bazaar_server::services::auth::{AuthError, AuthService};
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: user, admin")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with that email.
    #[error("No user with email: {0}")]
    NotFound(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Create a user with the given role.
pub async fn create(email: &str, name: &str, password: &str, role: &str) -> Result<(), UserError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;

    let pool = connect().await?;
    tracing::info!("Creating user: {} ({})", email, role);

    let user = AuthService::new(&pool)
        .create_user(name, email, password, role)
        .await?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(())
}

/// Set an existing user's role to admin.
pub async fn promote(email: &str) -> Result<(), UserError> {
    let parsed = Email::parse(email).map_err(|_| UserError::InvalidEmail(email.to_owned()))?;

    let pool = connect().await?;
    let user = UserRepository::new(&pool)
        .set_role_by_email(&parsed, UserRole::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => UserError::NotFound(email.to_owned()),
            other => UserError::Repository(other),
        })?;

    tracing::info!("Promoted {} (ID {}) to admin", user.email, user.id);
    Ok(())
}
