//! Warehouses, per-warehouse stock levels and stock transfers.

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use bazaar_core::{ProductId, StockTransferId, TransferStatus, WarehouseId};

use crate::db::{InventoryRepository, ProductRepository, inventory::WarehouseInput};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{InventoryLevel, LowStockProduct, StockTransfer, TransferItem, Warehouse};
use crate::response::{ApiResponse, Paginated};
use crate::services::inventory::InventoryService;
use crate::state::AppState;
use crate::validation::ValidatedJson;

use super::PageQuery;

#[derive(Debug, Deserialize, Validate)]
pub struct WarehouseRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl WarehouseRequest {
    fn as_input(&self) -> WarehouseInput<'_> {
        WarehouseInput {
            name: self.name.trim(),
            code: self.code.trim(),
            address: self.address.as_deref(),
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LevelRequest {
    pub product_id: ProductId,
    pub quantity: i32,
    #[serde(default)]
    pub reserved: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustRequest {
    pub product_id: ProductId,
    #[validate(range(min = -1_000_000, max = 1_000_000))]
    pub delta: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferRequest {
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    #[validate(nested)]
    pub items: Vec<TransferItem>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferStatusRequest {
    pub status: TransferStatus,
}

#[derive(Debug, Deserialize)]
pub struct TransferQuery {
    pub status: Option<TransferStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i32>,
}

fn warehouse_not_found() -> AppError {
    AppError::NotFound("Warehouse not found".to_owned())
}

// =============================================================================
// Warehouses
// =============================================================================

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn warehouses(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Warehouse>>> {
    let warehouses = InventoryRepository::new(state.pool()).warehouses().await?;
    Ok(ApiResponse::ok(warehouses))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn show_warehouse(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<WarehouseId>,
) -> Result<ApiResponse<Warehouse>> {
    let warehouse = InventoryRepository::new(state.pool())
        .warehouse(id)
        .await?
        .ok_or_else(warehouse_not_found)?;
    Ok(ApiResponse::ok(warehouse))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn create_warehouse(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<WarehouseRequest>,
) -> Result<ApiResponse<Warehouse>> {
    let warehouse = InventoryRepository::new(state.pool())
        .create_warehouse(&body.as_input())
        .await?;
    tracing::info!(warehouse_id = %warehouse.id, code = %warehouse.code, "Warehouse created");
    Ok(ApiResponse::created(warehouse))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update_warehouse(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<WarehouseId>,
    ValidatedJson(body): ValidatedJson<WarehouseRequest>,
) -> Result<ApiResponse<Warehouse>> {
    let warehouse = InventoryRepository::new(state.pool())
        .update_warehouse(id, &body.as_input())
        .await?;
    Ok(ApiResponse::ok(warehouse))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn delete_warehouse(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<WarehouseId>,
) -> Result<ApiResponse<()>> {
    InventoryRepository::new(state.pool())
        .delete_warehouse(id)
        .await?;
    Ok(ApiResponse::message("Warehouse deleted"))
}

// =============================================================================
// Levels
// =============================================================================

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn levels(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<WarehouseId>,
) -> Result<ApiResponse<Vec<InventoryLevel>>> {
    let repo = InventoryRepository::new(state.pool());
    repo.warehouse(id).await?.ok_or_else(warehouse_not_found)?;
    Ok(ApiResponse::ok(repo.levels(id).await?))
}

/// Set quantity and reserved for one product.
#[instrument(skip(state, body), fields(admin_id = %admin.id, product_id = %body.product_id))]
pub async fn set_level(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<WarehouseId>,
    ValidatedJson(body): ValidatedJson<LevelRequest>,
) -> Result<ApiResponse<InventoryLevel>> {
    InventoryService::new(state.pool())
        .set_level(id, body.product_id, body.quantity, body.reserved)
        .await?;
    current_level(&state, id, body.product_id).await
}

/// Apply a signed quantity change.
#[instrument(skip(state, body), fields(admin_id = %admin.id, product_id = %body.product_id))]
pub async fn adjust(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<WarehouseId>,
    ValidatedJson(body): ValidatedJson<AdjustRequest>,
) -> Result<ApiResponse<InventoryLevel>> {
    InventoryService::new(state.pool())
        .adjust(id, body.product_id, body.delta)
        .await?;
    current_level(&state, id, body.product_id).await
}

async fn current_level(
    state: &AppState,
    warehouse_id: WarehouseId,
    product_id: ProductId,
) -> Result<ApiResponse<InventoryLevel>> {
    let level = InventoryRepository::new(state.pool())
        .level(warehouse_id, product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory row not found".to_owned()))?;
    Ok(ApiResponse::ok(level))
}

/// Products at or below the threshold (configured default when absent).
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn low_stock(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<LowStockQuery>,
) -> Result<ApiResponse<Vec<LowStockProduct>>> {
    let threshold = query
        .threshold
        .unwrap_or(state.config().low_stock_threshold)
        .max(0);
    let products = ProductRepository::new(state.pool())
        .low_stock(threshold)
        .await?;
    Ok(ApiResponse::ok(products))
}

// =============================================================================
// Transfers
// =============================================================================

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn transfers(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<TransferQuery>,
) -> Result<ApiResponse<Paginated<StockTransfer>>> {
    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (transfers, total) = InventoryRepository::new(state.pool())
        .transfers(query.status, paging.page())
        .await?;
    Ok(ApiResponse::ok(paging.paginate(transfers, total)))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn show_transfer(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<StockTransferId>,
) -> Result<ApiResponse<StockTransfer>> {
    let transfer = InventoryRepository::new(state.pool())
        .transfer(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer not found".to_owned()))?;
    Ok(ApiResponse::ok(transfer))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn create_transfer(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<TransferRequest>,
) -> Result<ApiResponse<StockTransfer>> {
    let transfer = InventoryService::new(state.pool())
        .create_transfer(
            body.from_warehouse_id,
            body.to_warehouse_id,
            &body.items,
            body.notes.as_deref(),
            admin.id,
        )
        .await?;
    Ok(ApiResponse::created(transfer))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id, status = %body.status))]
pub async fn update_transfer_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<StockTransferId>,
    ValidatedJson(body): ValidatedJson<TransferStatusRequest>,
) -> Result<ApiResponse<StockTransfer>> {
    let transfer = InventoryService::new(state.pool())
        .transition_transfer(id, body.status)
        .await?;
    Ok(ApiResponse::ok(transfer))
}
