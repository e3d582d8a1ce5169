//! Profile, password and saved addresses of the logged-in user.

use axum::extract::{Path, State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use validator::Validate;

use bazaar_core::{AddressId, Email};

use crate::db::{AddressRepository, UserRepository, addresses::AddressInput};
use crate::error::{AppError, Result};
use crate::middleware::{RequireUser, set_current_user};
use crate::models::{Address, CurrentUser, User};
use crate::response::ApiResponse;
use crate::services::auth::AuthService;
use crate::state::AppState;
use crate::validation::ValidatedJson;

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressRequest {
    #[validate(length(max = 50))]
    pub label: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub recipient: String,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    #[validate(length(max = 200))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(custom(function = "crate::validation::country_code"))]
    pub country: String,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressRequest {
    fn as_input(&self) -> AddressInput<'_> {
        AddressInput {
            label: self.label.as_deref(),
            recipient: &self.recipient,
            line1: &self.line1,
            line2: self.line2.as_deref(),
            city: &self.city,
            state: self.state.as_deref(),
            postal_code: &self.postal_code,
            country: &self.country,
            phone: self.phone.as_deref(),
            is_default: self.is_default,
        }
    }
}

/// Update name and email. The session is refreshed with the new identity.
#[instrument(skip(state, session, body), fields(user_id = %user.id))]
pub async fn update_profile(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    session: Session,
    ValidatedJson(body): ValidatedJson<ProfileRequest>,
) -> Result<ApiResponse<User>> {
    let email = Email::parse(&body.email).map_err(|e| AppError::field("email", e.to_string()))?;
    let updated = UserRepository::new(state.pool())
        .update_profile(user.id, body.name.trim(), &email)
        .await?;

    set_current_user(&session, &CurrentUser::from(&updated)).await?;
    Ok(ApiResponse::ok(updated).with_message("Profile updated"))
}

/// Change password after verifying the current one.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn change_password(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<PasswordRequest>,
) -> Result<ApiResponse<()>> {
    AuthService::new(state.pool())
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;
    tracing::info!("Password changed");
    Ok(ApiResponse::message("Password changed"))
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn addresses(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Address>>> {
    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    Ok(ApiResponse::ok(addresses))
}

#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn create_address(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<AddressRequest>,
) -> Result<ApiResponse<Address>> {
    let address = AddressRepository::new(state.pool())
        .create(user.id, &body.as_input())
        .await?;
    Ok(ApiResponse::created(address))
}

#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn update_address(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
    ValidatedJson(body): ValidatedJson<AddressRequest>,
) -> Result<ApiResponse<Address>> {
    let address = AddressRepository::new(state.pool())
        .update(user.id, id, &body.as_input())
        .await?;
    Ok(ApiResponse::ok(address))
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn delete_address(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<ApiResponse<()>> {
    AddressRepository::new(state.pool())
        .delete(user.id, id)
        .await?;
    Ok(ApiResponse::message("Address deleted"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address(country: &str) -> AddressRequest {
        AddressRequest {
            label: None,
            recipient: "Jane Doe".to_owned(),
            line1: "1 Market Street".to_owned(),
            line2: None,
            city: "Springfield".to_owned(),
            state: None,
            postal_code: "12345".to_owned(),
            country: country.to_owned(),
            phone: None,
            is_default: false,
        }
    }

    #[test]
    fn test_address_country_code() {
        assert!(address("US").validate().is_ok());
        let err = address("usa").validate().unwrap_err();
        assert!(err.field_errors().contains_key("country"));
    }
}
