//! Support tickets.
//!
//! Shoppers open and reply on their own tickets. Admins see all of them and
//! manage status, priority and assignment.

use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use tracing::instrument;
use validator::Validate;

use bazaar_core::{NotificationKind, OrderId, TicketId, TicketPriority, TicketStatus, UserId};

use crate::db::{OrderRepository, TicketRepository, UserRepository, tickets::TicketUpdate};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::{CurrentUser, Ticket, TicketThread};
use crate::response::{ApiResponse, Paginated};
use crate::services::notifications;
use crate::services::numbering::{self, TICKET_PREFIX};
use crate::state::AppState;
use crate::validation::ValidatedJson;

use super::PageQuery;

#[derive(Debug, Deserialize)]
pub struct TicketQuery {
    pub status: Option<TicketStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OpenTicketRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
    #[serde(default)]
    pub priority: TicketPriority,
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplyRequest {
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TicketUpdateRequest {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    /// Absent leaves the assignee; `null` unassigns.
    #[serde(default, deserialize_with = "present")]
    pub assigned_to: Option<Option<UserId>>,
}

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn ticket_not_found() -> AppError {
    AppError::NotFound("Ticket not found".to_owned())
}

async fn visible_ticket(state: &AppState, viewer: &CurrentUser, id: TicketId) -> Result<Ticket> {
    TicketRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|t| viewer.is_admin() || t.user_id == viewer.id)
        .ok_or_else(ticket_not_found)
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(query): Query<TicketQuery>,
) -> Result<ApiResponse<Paginated<Ticket>>> {
    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let owner = (!user.is_admin()).then_some(user.id);
    let (tickets, total) = TicketRepository::new(state.pool())
        .list(owner, query.status, paging.page())
        .await?;
    Ok(ApiResponse::ok(paging.paginate(tickets, total)))
}

#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn create(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<OpenTicketRequest>,
) -> Result<ApiResponse<Ticket>> {
    if let Some(order_id) = body.order_id {
        OrderRepository::new(state.pool())
            .get(order_id)
            .await?
            .filter(|o| o.user_id == user.id)
            .ok_or_else(|| AppError::field("order_id", "Order not found"))?;
    }

    let ticket_number = numbering::reference_number(TICKET_PREFIX, Utc::now());
    let ticket = TicketRepository::new(state.pool())
        .create(
            &ticket_number,
            user.id,
            body.order_id,
            body.subject.trim(),
            body.priority,
            body.message.trim(),
        )
        .await?;

    tracing::info!(ticket_number = %ticket.ticket_number, "Ticket opened");
    Ok(ApiResponse::created(ticket))
}

/// Ticket with its full thread.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn show(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> Result<ApiResponse<TicketThread>> {
    let ticket = visible_ticket(&state, &user, id).await?;
    let messages = TicketRepository::new(state.pool()).messages(id).await?;
    Ok(ApiResponse::ok(TicketThread { ticket, messages }))
}

/// Reply on a ticket. A staff reply notifies the ticket owner.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn reply(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    ValidatedJson(body): ValidatedJson<ReplyRequest>,
) -> Result<ApiResponse<TicketThread>> {
    let ticket = visible_ticket(&state, &user, id).await?;
    if !ticket.status.accepts_replies() {
        return Err(AppError::BadRequest(
            "This ticket is closed and no longer accepts replies".to_owned(),
        ));
    }

    let is_staff = user.is_admin() && ticket.user_id != user.id;
    let repo = TicketRepository::new(state.pool());
    repo.add_message(id, user.id, is_staff, body.message.trim())
        .await?;

    if is_staff {
        notifications::notify(
            state.pool(),
            ticket.user_id,
            NotificationKind::TicketReply,
            &format!("New reply on {}", ticket.ticket_number),
            &ticket.subject,
            Some(&format!("/api/tickets/{id}")),
        )
        .await;
    }

    let messages = repo.messages(id).await?;
    Ok(ApiResponse::created(TicketThread { ticket, messages }))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    ValidatedJson(body): ValidatedJson<TicketUpdateRequest>,
) -> Result<ApiResponse<Ticket>> {
    if let Some(Some(assignee)) = body.assigned_to {
        UserRepository::new(state.pool())
            .get_by_id(assignee)
            .await?
            .filter(|u| u.is_active && u.role.is_admin())
            .ok_or_else(|| AppError::field("assigned_to", "Tickets can only be assigned to admins"))?;
    }

    let ticket = TicketRepository::new(state.pool())
        .update(
            id,
            TicketUpdate {
                status: body.status,
                priority: body.priority,
                assigned_to: body.assigned_to,
            },
        )
        .await?;
    tracing::info!(ticket_number = %ticket.ticket_number, status = %ticket.status, "Ticket updated");
    Ok(ApiResponse::ok(ticket))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_assignee_absent_vs_null() {
        let absent: TicketUpdateRequest = serde_json::from_str(r#"{"status": "resolved"}"#).unwrap();
        assert_eq!(absent.assigned_to, None);
        assert_eq!(absent.status, Some(TicketStatus::Resolved));

        let cleared: TicketUpdateRequest = serde_json::from_str(r#"{"assigned_to": null}"#).unwrap();
        assert_eq!(cleared.assigned_to, Some(None));

        let set: TicketUpdateRequest = serde_json::from_str(r#"{"assigned_to": 4}"#).unwrap();
        assert_eq!(set.assigned_to, Some(Some(UserId::new(4))));
    }

    #[test]
    fn test_priority_defaults_to_medium() {
        let body: OpenTicketRequest =
            serde_json::from_str(r#"{"subject": "Late", "message": "Where is it?"}"#).unwrap();
        assert_eq!(body.priority, TicketPriority::Medium);
    }
}
