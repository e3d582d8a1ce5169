//! Category listing and administration.

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use bazaar_core::CategoryId;

use crate::db::{CategoryRepository, categories::CategoryInput};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::Category;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validation::ValidatedJson;

use super::slug_or_from_name;

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom(function = "crate::validation::slug"))]
    pub slug: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub hard: bool,
}

/// Active categories in display order.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<ApiResponse<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool()).list(true).await?;
    Ok(ApiResponse::ok(categories))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<ApiResponse<Category>> {
    let category = CategoryRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| AppError::NotFound("Category not found".to_owned()))?;
    Ok(ApiResponse::ok(category))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CategoryRequest>,
) -> Result<ApiResponse<Category>> {
    let repo = CategoryRepository::new(state.pool());
    if let Some(parent_id) = body.parent_id {
        repo.get(parent_id)
            .await?
            .ok_or_else(|| AppError::field("parent_id", "Parent category does not exist"))?;
    }

    let slug = slug_or_from_name(body.slug.as_deref(), &body.name)?;
    let category = repo
        .create(&CategoryInput {
            name: body.name.trim(),
            slug: &slug,
            description: body.description.as_deref(),
            parent_id: body.parent_id,
            sort_order: body.sort_order,
            is_active: body.is_active,
        })
        .await?;

    tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
    Ok(ApiResponse::created(category))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    ValidatedJson(body): ValidatedJson<CategoryRequest>,
) -> Result<ApiResponse<Category>> {
    let repo = CategoryRepository::new(state.pool());
    if let Some(parent_id) = body.parent_id {
        repo.get(parent_id)
            .await?
            .ok_or_else(|| AppError::field("parent_id", "Parent category does not exist"))?;
        // A category cannot move under itself or one of its descendants
        if repo.is_descendant_or_self(parent_id, id).await? {
            return Err(AppError::field(
                "parent_id",
                "A category cannot be nested under itself",
            ));
        }
    }

    let slug = slug_or_from_name(body.slug.as_deref(), &body.name)?;
    let category = repo
        .update(
            id,
            &CategoryInput {
                name: body.name.trim(),
                slug: &slug,
                description: body.description.as_deref(),
                parent_id: body.parent_id,
                sort_order: body.sort_order,
                is_active: body.is_active,
            },
        )
        .await?;
    Ok(ApiResponse::ok(category))
}

/// Soft delete by default; `?hard=true` removes the row.
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Query(query): Query<DeleteQuery>,
) -> Result<ApiResponse<()>> {
    CategoryRepository::new(state.pool())
        .delete(id, query.hard)
        .await?;
    tracing::info!(category_id = %id, hard = query.hard, "Category deleted");
    Ok(ApiResponse::message("Category deleted"))
}
