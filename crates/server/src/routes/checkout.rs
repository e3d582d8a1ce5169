//! Checkout handler.

use axum::extract::State;
use chrono::Utc;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::response::ApiResponse;
use crate::services::checkout::{self, CheckoutRequest, PgCheckoutStore, PlacedOrder};
use crate::services::{email, notifications};
use crate::state::AppState;
use crate::validation::ValidatedJson;

/// Turn the cart into an order and invoice.
///
/// The in-app notification and confirmation email follow the commit and
/// never fail the request.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn place_order(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CheckoutRequest>,
) -> Result<ApiResponse<PlacedOrder>> {
    let store = PgCheckoutStore::new(state.pool());
    let placed = checkout::checkout(
        &store,
        &state.config().checkout,
        user.id,
        body,
        Utc::now(),
    )
    .await?;

    notifications::order_placed(state.pool(), &placed.order.order).await;
    email::spawn_order_confirmation(
        state.email(),
        user.email.as_str().to_owned(),
        user.name.clone(),
        placed.order.clone(),
    );

    Ok(ApiResponse::created(placed).with_message("Order placed"))
}
