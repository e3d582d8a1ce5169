//! Product reviews and their moderation.

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

use bazaar_core::{ProductId, ReviewId};

use crate::db::{ProductRepository, RepositoryError, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::{Review, ReviewSummary};
use crate::response::{ApiResponse, Paginated};
use crate::state::AppState;
use crate::validation::ValidatedJson;

use super::PageQuery;

/// Approved reviews of one product with its rating summary.
#[derive(Debug, Serialize)]
pub struct ProductReviews {
    #[serde(flatten)]
    pub summary: ReviewSummary,
    pub reviews: Vec<Review>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "Review text is required"))]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ModerationQuery {
    pub approved: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ModerationRequest {
    pub is_approved: bool,
}

#[instrument(skip(state))]
pub async fn for_product(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Query(paging): Query<PageQuery>,
) -> Result<ApiResponse<ProductReviews>> {
    let repo = ReviewRepository::new(state.pool());
    let summary = repo.summary(product_id).await?;
    let reviews = repo
        .approved_for_product(product_id, paging.page())
        .await?;
    Ok(ApiResponse::ok(ProductReviews { summary, reviews }))
}

/// Post a review. It stays hidden until an admin approves it.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn create(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    ValidatedJson(body): ValidatedJson<ReviewRequest>,
) -> Result<ApiResponse<Review>> {
    ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;

    let repo = ReviewRepository::new(state.pool());
    let is_verified = repo.has_delivered_purchase(user.id, product_id).await?;
    let id = repo
        .create(
            product_id,
            user.id,
            body.rating,
            body.title.as_deref(),
            body.body.trim(),
            is_verified,
        )
        .await?;
    let review = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::Internal("review vanished after insert".to_owned()))?;

    tracing::info!(review_id = %id, is_verified, "Review submitted");
    Ok(ApiResponse::created(review).with_message("Thanks! Your review is awaiting approval."))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ModerationQuery>,
) -> Result<ApiResponse<Paginated<Review>>> {
    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (reviews, total) = ReviewRepository::new(state.pool())
        .list(query.approved, paging.page())
        .await?;
    Ok(ApiResponse::ok(paging.paginate(reviews, total)))
}

/// Approve or unapprove.
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn moderate(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
    ValidatedJson(body): ValidatedJson<ModerationRequest>,
) -> Result<ApiResponse<Review>> {
    let repo = ReviewRepository::new(state.pool());
    repo.set_approved(id, body.is_approved).await?;
    let review = repo.get(id).await?.ok_or(RepositoryError::NotFound)?;
    Ok(ApiResponse::ok(review))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
) -> Result<ApiResponse<()>> {
    ReviewRepository::new(state.pool()).delete(id).await?;
    Ok(ApiResponse::message("Review deleted"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn review(rating: i16) -> ReviewRequest {
        ReviewRequest {
            rating,
            title: None,
            body: "Fits well".to_owned(),
        }
    }

    #[test]
    fn test_rating_must_be_one_to_five() {
        assert!(review(1).validate().is_ok());
        assert!(review(5).validate().is_ok());
        assert!(review(0).validate().is_err());
        assert!(review(6).validate().is_err());
    }
}
