//! The signed-in user's notifications.

use axum::extract::{Path, Query, State};
use tracing::instrument;

use bazaar_core::NotificationId;

use crate::db::NotificationRepository;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::NotificationList;
use crate::response::ApiResponse;
use crate::state::AppState;

use super::PageQuery;

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(paging): Query<PageQuery>,
) -> Result<ApiResponse<NotificationList>> {
    let repo = NotificationRepository::new(state.pool());
    let items = repo.list(user.id, paging.page()).await?;
    let unread_count = repo.unread_count(user.id).await?;
    Ok(ApiResponse::ok(NotificationList {
        items,
        unread_count,
    }))
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn mark_read(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<ApiResponse<()>> {
    NotificationRepository::new(state.pool())
        .mark_read(user.id, id)
        .await?;
    Ok(ApiResponse::message("Notification marked read"))
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn mark_all_read(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<ApiResponse<()>> {
    let marked = NotificationRepository::new(state.pool())
        .mark_all_read(user.id)
        .await?;
    Ok(ApiResponse::message(format!("{marked} notifications marked read")))
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn delete(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<ApiResponse<()>> {
    NotificationRepository::new(state.pool())
        .delete(user.id, id)
        .await?;
    Ok(ApiResponse::message("Notification deleted"))
}
