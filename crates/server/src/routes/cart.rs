//! Shopping cart handlers.
//!
//! Prices on cart lines are refreshed whenever a line changes; checkout
//! re-prices everything anyway, so the cart total is a preview.

use axum::extract::{Path, State};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use bazaar_core::{CartItemId, ProductId, UserId, VariantId};

use crate::db::{CartRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::Cart;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validation::ValidatedJson;

/// Largest quantity of one line.
const MAX_LINE_QUANTITY: i32 = 99;

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    #[validate(range(min = 1, max = 99, message = "Quantity must be between 1 and 99"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(range(min = 1, max = 99, message = "Quantity must be between 1 and 99"))]
    pub quantity: i32,
}

/// Current price and stock of a product or variant.
struct Purchasable {
    name: String,
    unit_price: Decimal,
    stock: i32,
}

async fn purchasable(
    state: &AppState,
    product_id: ProductId,
    variant_id: Option<VariantId>,
) -> Result<Purchasable> {
    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get(product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;
    let now = Utc::now();

    match variant_id {
        Some(variant_id) => {
            let variant = repo
                .variant(product_id, variant_id)
                .await?
                .filter(|v| v.is_active)
                .ok_or_else(|| AppError::NotFound("Variant not found".to_owned()))?;
            Ok(Purchasable {
                name: format!("{} ({})", product.name, variant.name),
                unit_price: variant.effective_price(&product, now),
                stock: variant.stock,
            })
        }
        None => Ok(Purchasable {
            name: product.name.clone(),
            unit_price: product.effective_price(now),
            stock: product.stock,
        }),
    }
}

fn ensure_stock(item: &Purchasable, quantity: i32) -> Result<()> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::field(
            "quantity",
            format!("At most {MAX_LINE_QUANTITY} of one item per order"),
        ));
    }
    if quantity > item.stock {
        return Err(AppError::BadRequest(format!(
            "Only {} of {} in stock",
            item.stock.max(0),
            item.name
        )));
    }
    Ok(())
}

async fn load_cart(state: &AppState, user_id: UserId) -> Result<Cart> {
    let items = CartRepository::new(state.pool()).items(user_id).await?;
    Ok(Cart::from_items(items))
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn show(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<ApiResponse<Cart>> {
    Ok(ApiResponse::ok(load_cart(&state, user.id).await?))
}

/// Add a product (or variant) to the cart, merging with an existing line.
#[instrument(skip(state, body), fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn add_item(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<AddItemRequest>,
) -> Result<ApiResponse<Cart>> {
    let item = purchasable(&state, body.product_id, body.variant_id).await?;
    let carts = CartRepository::new(state.pool());
    let in_cart = carts
        .quantity_of(user.id, body.product_id, body.variant_id)
        .await?;
    ensure_stock(&item, in_cart + body.quantity)?;

    carts
        .add(
            user.id,
            body.product_id,
            body.variant_id,
            body.quantity,
            item.unit_price,
        )
        .await?;

    Ok(ApiResponse::ok(load_cart(&state, user.id).await?).with_message("Added to cart"))
}

#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn update_item(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<CartItemId>,
    ValidatedJson(body): ValidatedJson<UpdateItemRequest>,
) -> Result<ApiResponse<Cart>> {
    let carts = CartRepository::new(state.pool());
    let line = carts
        .item(user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".to_owned()))?;

    let item = purchasable(&state, line.product_id, line.variant_id).await?;
    ensure_stock(&item, body.quantity)?;
    carts
        .set_quantity(user.id, id, body.quantity, item.unit_price)
        .await?;

    Ok(ApiResponse::ok(load_cart(&state, user.id).await?))
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn remove_item(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<CartItemId>,
) -> Result<ApiResponse<Cart>> {
    CartRepository::new(state.pool()).remove(user.id, id).await?;
    Ok(ApiResponse::ok(load_cart(&state, user.id).await?))
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn clear(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<ApiResponse<()>> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    Ok(ApiResponse::message("Cart cleared"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(stock: i32) -> Purchasable {
        Purchasable {
            name: "Mug".to_owned(),
            unit_price: Decimal::new(1200, 2),
            stock,
        }
    }

    #[test]
    fn test_stock_check() {
        assert!(ensure_stock(&item(5), 5).is_ok());
        assert!(matches!(
            ensure_stock(&item(5), 6),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            ensure_stock(&item(500), 100),
            Err(AppError::Validation(_))
        ));
    }
}
