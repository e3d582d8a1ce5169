//! API key management.
//!
//! Keys can only be managed from a browser session, so a leaked key cannot
//! mint more keys.

use axum::extract::{Path, State};
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use bazaar_core::ApiKeyId;

use crate::error::Result;
use crate::middleware::RequireSessionAdmin;
use crate::models::{ApiKey, CreatedApiKey};
use crate::response::ApiResponse;
use crate::services::api_keys::ApiKeyService;
use crate::state::AppState;
use crate::validation::ValidatedJson;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateKeyRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn index(
    RequireSessionAdmin(admin): RequireSessionAdmin,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<ApiKey>>> {
    let keys = ApiKeyService::new(state.pool()).list().await?;
    Ok(ApiResponse::ok(keys))
}

/// The secret is returned once, in this response only.
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn create(
    RequireSessionAdmin(admin): RequireSessionAdmin,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateKeyRequest>,
) -> Result<ApiResponse<CreatedApiKey>> {
    let created = ApiKeyService::new(state.pool())
        .create(admin.id, &body.name)
        .await?;
    Ok(ApiResponse::created(created).with_message("Store this key now; it will not be shown again"))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn revoke(
    RequireSessionAdmin(admin): RequireSessionAdmin,
    State(state): State<AppState>,
    Path(id): Path<ApiKeyId>,
) -> Result<ApiResponse<()>> {
    ApiKeyService::new(state.pool()).revoke(id).await?;
    Ok(ApiResponse::message("API key revoked"))
}
