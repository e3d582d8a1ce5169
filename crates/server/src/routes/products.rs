//! Catalog browsing, product and variant administration.

use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::{Validate, ValidationError};

use bazaar_core::{CategoryId, ProductId, Sku, Slug, VariantId};

use crate::db::{
    CategoryRepository, Page, ProductRepository,
    products::{BulkAction, ProductFilter, ProductInput, ProductSort, VariantInput},
};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalUser, RequireAdmin};
use crate::models::{ProductDetail, Variant};
use crate::response::{ApiResponse, Paginated};
use crate::state::AppState;
use crate::validation::ValidatedJson;

use super::{PageQuery, slug_or_from_name};

/// Listing filters from the query string.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub on_sale: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
    /// Honored for admins only.
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_product"))]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom(function = "crate::validation::slug"))]
    pub slug: Option<String>,
    #[validate(custom(function = "crate::validation::sku"))]
    pub sku: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[validate(custom(function = "crate::validation::non_negative"))]
    pub price: Decimal,
    #[validate(custom(function = "crate::validation::non_negative"))]
    pub compare_at_price: Option<Decimal>,
    #[validate(custom(function = "crate::validation::non_negative"))]
    pub sale_price: Option<Decimal>,
    pub sale_starts_at: Option<DateTime<Utc>>,
    pub sale_ends_at: Option<DateTime<Utc>>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    #[serde(default)]
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_on_sale: bool,
    #[validate(length(max = 20))]
    #[serde(default)]
    pub images: Vec<String>,
}

const fn default_true() -> bool {
    true
}

fn validate_product(product: &ProductRequest) -> std::result::Result<(), ValidationError> {
    if let Some(sale_price) = product.sale_price
        && sale_price >= product.price
    {
        return Err(ValidationError::new("sale_price")
            .with_message("Sale price must be below the regular price".into()));
    }
    if let (Some(starts), Some(ends)) = (product.sale_starts_at, product.sale_ends_at)
        && ends <= starts
    {
        return Err(ValidationError::new("sale_window")
            .with_message("Sale must end after it starts".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct VariantRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom(function = "crate::validation::sku"))]
    pub sku: String,
    #[validate(custom(function = "crate::validation::non_negative"))]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "empty_object")]
    pub attributes: serde_json::Value,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Bulk operation name as sent by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperation {
    Activate,
    Deactivate,
    Feature,
    Unfeature,
    Delete,
    SetCategory,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkRequest {
    #[validate(length(min = 1, max = 500, message = "Select between 1 and 500 products"))]
    pub ids: Vec<ProductId>,
    pub action: BulkOperation,
    /// Target for `set_category`; `null` clears the category.
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Serialize)]
pub struct BulkResult {
    pub updated: u64,
}

/// Public catalog listing.
#[instrument(skip(state, viewer))]
pub async fn index(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Query(query): Query<ProductQuery>,
) -> Result<ApiResponse<Paginated<ProductDetail>>> {
    let is_admin = viewer.as_ref().is_some_and(|v| v.is_admin());
    let filter = ProductFilter {
        category_slug: query.category.clone(),
        search: query.search.clone().filter(|s| !s.trim().is_empty()),
        featured: query.featured,
        on_sale: query.on_sale,
        min_price: query.min_price,
        max_price: query.max_price,
        sort: query.sort,
        include_inactive: query.include_inactive && is_admin,
    };
    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };

    let (products, total) = ProductRepository::new(state.pool())
        .list(&filter, paging.page())
        .await?;

    let now = Utc::now();
    let items = products
        .into_iter()
        .map(|p| ProductDetail::new(p, Vec::new(), now))
        .collect();
    Ok(ApiResponse::ok(paging.paginate(items, total)))
}

/// Product detail with its active variants.
#[instrument(skip(state, viewer))]
pub async fn show(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(id): Path<ProductId>,
) -> Result<ApiResponse<ProductDetail>> {
    let is_admin = viewer.as_ref().is_some_and(|v| v.is_admin());
    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get(id)
        .await?
        .filter(|p| p.is_active || is_admin)
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;
    let variants = repo.variants(id, !is_admin).await?;

    Ok(ApiResponse::ok(ProductDetail::new(product, variants, Utc::now())))
}

#[instrument(skip(state))]
pub async fn show_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<ApiResponse<ProductDetail>> {
    let slug = Slug::parse(&slug).map_err(|_| AppError::NotFound("Product not found".to_owned()))?;
    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get_by_slug(&slug)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;
    let variants = repo.variants(product.id, true).await?;

    Ok(ApiResponse::ok(ProductDetail::new(product, variants, Utc::now())))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id, sku = %body.sku))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ProductRequest>,
) -> Result<ApiResponse<ProductDetail>> {
    let (slug, sku) = product_identity(&state, &body).await?;
    let product = ProductRepository::new(state.pool())
        .create(&product_input(&body, &slug, &sku))
        .await?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok(ApiResponse::created(ProductDetail::new(
        product,
        Vec::new(),
        Utc::now(),
    )))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    ValidatedJson(body): ValidatedJson<ProductRequest>,
) -> Result<ApiResponse<ProductDetail>> {
    let (slug, sku) = product_identity(&state, &body).await?;
    let repo = ProductRepository::new(state.pool());
    let product = repo.update(id, &product_input(&body, &slug, &sku)).await?;
    let variants = repo.variants(id, false).await?;

    Ok(ApiResponse::ok(ProductDetail::new(product, variants, Utc::now())))
}

/// Soft delete.
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<ApiResponse<()>> {
    ProductRepository::new(state.pool()).soft_delete(id).await?;
    tracing::info!(product_id = %id, "Product deactivated");
    Ok(ApiResponse::message("Product deleted"))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id, action = ?body.action))]
pub async fn bulk(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<BulkRequest>,
) -> Result<ApiResponse<BulkResult>> {
    let action = match body.action {
        BulkOperation::Activate => BulkAction::Activate,
        BulkOperation::Deactivate => BulkAction::Deactivate,
        BulkOperation::Feature => BulkAction::Feature,
        BulkOperation::Unfeature => BulkAction::Unfeature,
        BulkOperation::Delete => BulkAction::Delete,
        BulkOperation::SetCategory => {
            if let Some(category_id) = body.category_id {
                ensure_category(&state, category_id).await?;
            }
            BulkAction::SetCategory(body.category_id)
        }
    };

    let updated = ProductRepository::new(state.pool())
        .bulk_update(&body.ids, action)
        .await?;
    tracing::info!(updated, "Bulk product update");
    Ok(ApiResponse::ok(BulkResult { updated }))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id, sku = %body.sku))]
pub async fn create_variant(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    ValidatedJson(body): ValidatedJson<VariantRequest>,
) -> Result<ApiResponse<Variant>> {
    let repo = ProductRepository::new(state.pool());
    repo.get(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;

    let sku = parse_sku(&body.sku)?;
    let variant = repo
        .create_variant(product_id, &variant_input(&body, &sku))
        .await?;
    Ok(ApiResponse::created(variant))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update_variant(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path((product_id, variant_id)): Path<(ProductId, VariantId)>,
    ValidatedJson(body): ValidatedJson<VariantRequest>,
) -> Result<ApiResponse<Variant>> {
    let sku = parse_sku(&body.sku)?;
    let variant = ProductRepository::new(state.pool())
        .update_variant(product_id, variant_id, &variant_input(&body, &sku))
        .await?;
    Ok(ApiResponse::ok(variant))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn delete_variant(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path((product_id, variant_id)): Path<(ProductId, VariantId)>,
) -> Result<ApiResponse<()>> {
    ProductRepository::new(state.pool())
        .delete_variant(product_id, variant_id)
        .await?;
    Ok(ApiResponse::message("Variant deleted"))
}

async fn product_identity(state: &AppState, body: &ProductRequest) -> Result<(Slug, Sku)> {
    if let Some(category_id) = body.category_id {
        ensure_category(state, category_id).await?;
    }
    let slug = slug_or_from_name(body.slug.as_deref(), &body.name)?;
    let sku = parse_sku(&body.sku)?;
    Ok((slug, sku))
}

async fn ensure_category(state: &AppState, id: CategoryId) -> Result<()> {
    CategoryRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::field("category_id", "Category does not exist"))?;
    Ok(())
}

fn parse_sku(raw: &str) -> Result<Sku> {
    Sku::parse(raw).map_err(|e| AppError::field("sku", e.to_string()))
}

fn product_input<'a>(body: &'a ProductRequest, slug: &'a Slug, sku: &'a Sku) -> ProductInput<'a> {
    ProductInput {
        name: body.name.trim(),
        slug,
        sku,
        description: body.description.as_deref(),
        price: body.price,
        compare_at_price: body.compare_at_price,
        sale_price: body.sale_price,
        sale_starts_at: body.sale_starts_at,
        sale_ends_at: body.sale_ends_at,
        stock: body.stock,
        category_id: body.category_id,
        is_active: body.is_active,
        is_featured: body.is_featured,
        is_on_sale: body.is_on_sale,
        images: &body.images,
    }
}

fn variant_input<'a>(body: &'a VariantRequest, sku: &'a Sku) -> VariantInput<'a> {
    VariantInput {
        name: body.name.trim(),
        sku,
        price: body.price,
        stock: body.stock,
        attributes: &body.attributes,
        is_active: body.is_active,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(price: Decimal, sale_price: Option<Decimal>) -> ProductRequest {
        serde_json::from_value(serde_json::json!({
            "name": "Linen Shirt",
            "sku": "LINEN-01",
            "price": price.to_string(),
            "sale_price": sale_price.map(|p| p.to_string()),
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let body = request(Decimal::new(4999, 2), None);
        assert!(body.is_active);
        assert!(!body.is_featured);
        assert_eq!(body.stock, 0);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_sale_price_must_be_below_price() {
        let body = request(Decimal::new(4999, 2), Some(Decimal::new(4999, 2)));
        assert!(body.validate().is_err());

        let body = request(Decimal::new(4999, 2), Some(Decimal::new(3999, 2)));
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_bulk_operation_names() {
        let body: BulkRequest = serde_json::from_value(serde_json::json!({
            "ids": [1, 2],
            "action": "set_category",
            "category_id": null,
        }))
        .unwrap();
        assert_eq!(body.action, BulkOperation::SetCategory);
        assert!(body.category_id.is_none());
        assert!(body.validate().is_ok());
    }
}
