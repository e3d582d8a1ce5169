//! Registration, login and logout.

use axum::extract::State;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use validator::Validate;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireUser, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::response::ApiResponse;
use crate::services::auth::AuthService;
use crate::services::email;
use crate::state::AppState;
use crate::validation::ValidatedJson;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Create a shopper account and log it in.
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<ApiResponse<User>> {
    let user = AuthService::new(state.pool())
        .register(&body.name, &body.email, &body.password)
        .await?;

    start_session(&session, &user).await?;
    tracing::info!(user_id = %user.id, "User registered");

    email::spawn_welcome(
        state.email(),
        user.email.as_str().to_owned(),
        user.name.clone(),
    );

    Ok(ApiResponse::created(user).with_message("Account created"))
}

/// Verify credentials and start a session.
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse<User>> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Login failed"))?;

    start_session(&session, &user).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(ApiResponse::ok(user).with_message("Logged in"))
}

/// End the session. Succeeds whether or not anyone was logged in.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<ApiResponse<()>> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(ApiResponse::message("Logged out"))
}

/// The logged-in user, freshly loaded.
#[instrument(skip_all)]
pub async fn me(RequireUser(user): RequireUser) -> ApiResponse<CurrentUser> {
    ApiResponse::ok(user)
}

async fn start_session(session: &Session, user: &User) -> Result<()> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));
    Ok(())
}
