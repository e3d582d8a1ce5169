//! Authentication extractors.
//!
//! The session stores a [`CurrentUser`]; every protected request reloads the
//! account so deactivation and demotion take effect immediately. Admin
//! routes also accept `Authorization: Bearer <api key>`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tower_sessions::Session;

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::api_keys::ApiKeyService;
use crate::state::AppState;

/// Any logged-in, active user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

/// A logged-in, active admin, by session or bearer API key.
pub struct RequireAdmin(pub CurrentUser);

/// A logged-in, active admin, by session only.
///
/// Used for API key management so a key cannot mint or revoke keys.
pub struct RequireSessionAdmin(pub CurrentUser);

/// The session user, if any, without a database check.
pub struct OptionalUser(pub Option<CurrentUser>);

fn session(parts: &Parts) -> Result<&Session, AppError> {
    parts
        .extensions
        .get::<Session>()
        .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))
}

async fn session_user(parts: &Parts, state: &AppState) -> Result<CurrentUser, AppError> {
    let session = session(parts)?;
    let stored: CurrentUser = session
        .get(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| AppError::Unauthorized("Please log in".to_owned()))?;

    let Some(user) = UserRepository::new(state.pool())
        .get_by_id(stored.id)
        .await?
        .filter(|u| u.is_active)
    else {
        clear_current_user(session).await?;
        return Err(AppError::Unauthorized("Please log in".to_owned()));
    };

    let current = CurrentUser::from(&user);
    set_sentry_user(&current.id, Some(current.email.as_str()));
    Ok(current)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

fn require_admin_role(user: CurrentUser) -> Result<CurrentUser, AppError> {
    if user.is_admin() {
        Ok(user)
    } else {
        Err(AppError::Forbidden("Admin access required".to_owned()))
    }
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        session_user(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(parts) {
            let owner = ApiKeyService::new(state.pool()).authenticate(token).await?;
            let current = CurrentUser::from(&owner);
            set_sentry_user(&current.id, Some(current.email.as_str()));
            return Ok(Self(current));
        }

        let user = session_user(parts, state).await?;
        require_admin_role(user).map(Self)
    }
}

impl FromRequestParts<AppState> for RequireSessionAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = session_user(parts, state).await?;
        require_admin_role(user).map(Self)
    }
}

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(session_keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

/// Store the logged-in user, rotating the session ID first.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session cannot be modified.
pub async fn set_current_user(session: &Session, user: &CurrentUser) -> Result<(), AppError> {
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    session
        .insert(session_keys::CURRENT_USER, user)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))
}

/// Remove the logged-in user from the session (logout).
///
/// # Errors
///
/// Returns `AppError::Internal` if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), AppError> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;
    use bazaar_core::{Email, UserId, UserRole};

    use super::*;

    fn user(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("someone@example.com").unwrap(),
            name: "Someone".to_owned(),
            role,
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        let (parts, ()) = Request::builder()
            .header(AUTHORIZATION, "Bearer bzr_abc ")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), Some("bzr_abc"));

        let (parts, ()) = Request::builder()
            .header(AUTHORIZATION, "Basic Zm9vOmJhcg==")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn test_admin_role_required() {
        assert!(require_admin_role(user(UserRole::Admin)).is_ok());
        assert!(matches!(
            require_admin_role(user(UserRole::User)),
            Err(AppError::Forbidden(_))
        ));
    }
}
