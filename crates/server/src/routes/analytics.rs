//! Admin dashboard figures.

use std::sync::Arc;

use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::AnalyticsSummary;
use crate::response::ApiResponse;
use crate::services::analytics::{self, MAX_DAYS};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<u32>,
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn summary(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<ApiResponse<AnalyticsSummary>> {
    let days = analytics::window_days(query.days)
        .ok_or_else(|| AppError::field("days", format!("Choose between 1 and {MAX_DAYS} days")))?;
    let summary = state
        .analytics()
        .summary(state.pool(), days, state.config().low_stock_threshold)
        .await?;
    Ok(ApiResponse::ok(Arc::unwrap_or_clone(summary)))
}
