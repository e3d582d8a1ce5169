//! Orders and invoices.
//!
//! Shoppers see their own orders; admins see every order and drive the
//! status and payment lifecycle.

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use bazaar_core::{InvoiceId, OrderId, OrderStatus, PaymentStatus};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::{CurrentUser, Invoice, Order, OrderWithItems};
use crate::response::{ApiResponse, Paginated};
use crate::services::orders::OrderService;
use crate::state::AppState;
use crate::validation::ValidatedJson;

use super::PageQuery;

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: OrderStatus,
    #[validate(length(min = 1, max = 100))]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentRequest {
    pub payment_status: PaymentStatus,
}

fn order_not_found() -> AppError {
    AppError::NotFound("Order not found".to_owned())
}

/// Orders the viewer may see: their own, or all for an admin.
async fn visible_order(
    state: &AppState,
    viewer: &CurrentUser,
    id: OrderId,
) -> Result<OrderWithItems> {
    OrderRepository::new(state.pool())
        .get_with_items(id)
        .await?
        .filter(|o| viewer.is_admin() || o.order.user_id == viewer.id)
        .ok_or_else(order_not_found)
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> Result<ApiResponse<Paginated<Order>>> {
    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let owner = (!user.is_admin()).then_some(user.id);
    let (orders, total) = OrderRepository::new(state.pool())
        .list(owner, query.status, paging.page())
        .await?;
    Ok(ApiResponse::ok(paging.paginate(orders, total)))
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn show(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<ApiResponse<OrderWithItems>> {
    Ok(ApiResponse::ok(visible_order(&state, &user, id).await?))
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn invoice(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<ApiResponse<Invoice>> {
    let order = visible_order(&state, &user, id).await?;
    let invoice = OrderRepository::new(state.pool())
        .invoice_for_order(order.order.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Invoice not found".to_owned()))?;
    Ok(ApiResponse::ok(invoice))
}

/// Shopper cancellation while the order is pending or confirmed.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn cancel(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<ApiResponse<Order>> {
    let order = OrderService::new(state.pool()).cancel_own(user.id, id).await?;
    Ok(ApiResponse::ok(order).with_message("Order cancelled"))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id, status = %body.status))]
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    ValidatedJson(body): ValidatedJson<StatusRequest>,
) -> Result<ApiResponse<Order>> {
    let order = OrderService::new(state.pool())
        .change_status(id, body.status, body.tracking_number.as_deref())
        .await?;
    Ok(ApiResponse::ok(order))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id, payment_status = %body.payment_status))]
pub async fn update_payment(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    ValidatedJson(body): ValidatedJson<PaymentRequest>,
) -> Result<ApiResponse<Order>> {
    let order = OrderService::new(state.pool())
        .change_payment(id, body.payment_status)
        .await?;
    Ok(ApiResponse::ok(order))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn invoices(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(paging): Query<PageQuery>,
) -> Result<ApiResponse<Paginated<Invoice>>> {
    let (invoices, total) = OrderRepository::new(state.pool())
        .list_invoices(paging.page())
        .await?;
    Ok(ApiResponse::ok(paging.paginate(invoices, total)))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn show_invoice(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
) -> Result<ApiResponse<Invoice>> {
    let invoice = OrderRepository::new(state.pool())
        .invoice(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Invoice not found".to_owned()))?;
    Ok(ApiResponse::ok(invoice))
}
