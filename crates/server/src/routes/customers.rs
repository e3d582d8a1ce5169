//! Customer administration.

use axum::extract::{Path, Query, State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

use bazaar_core::{UserId, UserRole};

use crate::db::{AddressRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Address, User};
use crate::response::{ApiResponse, Paginated};
use crate::state::AppState;
use crate::validation::ValidatedJson;

use super::PageQuery;

#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// A customer with lifetime totals.
#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub user: User,
    pub order_count: i64,
    pub total_spent: Decimal,
    pub addresses: Vec<Address>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AccessRequest {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> Result<ApiResponse<Paginated<User>>> {
    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let search = query.search.as_deref().filter(|s| !s.trim().is_empty());
    let (customers, total) = UserRepository::new(state.pool())
        .list_customers(search, paging.page())
        .await?;
    Ok(ApiResponse::ok(paging.paginate(customers, total)))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn show(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<ApiResponse<CustomerDetail>> {
    let users = UserRepository::new(state.pool());
    let user = users
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer not found".to_owned()))?;
    let (order_count, total_spent) = users.customer_stats(id).await?;
    let addresses = AddressRepository::new(state.pool()).list(id).await?;

    Ok(ApiResponse::ok(CustomerDetail {
        user,
        order_count,
        total_spent,
        addresses,
    }))
}

/// Change role or active flag. Admins cannot change their own access.
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    ValidatedJson(body): ValidatedJson<AccessRequest>,
) -> Result<ApiResponse<User>> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot change your own role or status".to_owned(),
        ));
    }
    if body.role.is_none() && body.is_active.is_none() {
        return Err(AppError::BadRequest("Nothing to update".to_owned()));
    }

    let user = UserRepository::new(state.pool())
        .update_access(id, body.role, body.is_active)
        .await?;
    tracing::info!(
        user_id = %user.id,
        role = %user.role,
        is_active = user.is_active,
        "Customer access updated"
    );
    Ok(ApiResponse::ok(user))
}
