//! Live support chat, polled by message cursor.

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use bazaar_core::{ChatMessageId, ConversationId, ConversationStatus, NotificationKind};

use crate::db::ChatRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::{ChatMessage, Conversation, CurrentUser, MessagesPage};
use crate::response::ApiResponse;
use crate::services::notifications;
use crate::state::AppState;
use crate::validation::ValidatedJson;

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub status: Option<ConversationStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    pub after: Option<ChatMessageId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OpenRequest {
    #[validate(length(max = 200))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MessageRequest {
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
}

async fn visible_conversation(
    state: &AppState,
    viewer: &CurrentUser,
    id: ConversationId,
) -> Result<Conversation> {
    ChatRepository::new(state.pool())
        .conversation(id)
        .await?
        .filter(|c| viewer.is_admin() || c.customer_id == viewer.id)
        .ok_or_else(|| AppError::NotFound("Conversation not found".to_owned()))
}

/// Staff are admins posting on someone else's conversation.
fn is_staff(viewer: &CurrentUser, conversation: &Conversation) -> bool {
    viewer.is_admin() && conversation.customer_id != viewer.id
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn conversations(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
) -> Result<ApiResponse<Vec<Conversation>>> {
    let customer = (!user.is_admin()).then_some(user.id);
    let conversations = ChatRepository::new(state.pool())
        .conversations(customer, query.status)
        .await?;
    Ok(ApiResponse::ok(conversations))
}

#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn open(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<OpenRequest>,
) -> Result<ApiResponse<Conversation>> {
    let repo = ChatRepository::new(state.pool());
    let subject = body.subject.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let id = repo.open(user.id, subject, body.message.trim()).await?;
    let conversation = repo
        .conversation(id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("conversation {id} vanished after insert")))?;

    tracing::info!(conversation_id = %id, "Chat opened");
    Ok(ApiResponse::created(conversation))
}

/// Messages newer than `?after=`, with the cursor for the next poll.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn messages(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    Query(query): Query<PollQuery>,
) -> Result<ApiResponse<MessagesPage>> {
    let conversation = visible_conversation(&state, &user, id).await?;
    let messages = ChatRepository::new(state.pool())
        .messages_after(id, query.after)
        .await?;
    Ok(ApiResponse::ok(MessagesPage::new(
        conversation.status,
        messages,
        query.after,
    )))
}

/// Post a message. A staff message notifies the customer.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn post(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    ValidatedJson(body): ValidatedJson<MessageRequest>,
) -> Result<ApiResponse<ChatMessage>> {
    let conversation = visible_conversation(&state, &user, id).await?;
    if conversation.status == ConversationStatus::Closed {
        return Err(AppError::BadRequest("This conversation is closed".to_owned()));
    }

    let staff = is_staff(&user, &conversation);
    let message = ChatRepository::new(state.pool())
        .post(id, user.id, staff, body.message.trim())
        .await?;

    if staff {
        notifications::notify(
            state.pool(),
            conversation.customer_id,
            NotificationKind::ChatMessage,
            "New message from support",
            &message.body,
            Some(&format!("/api/chat/{id}/messages")),
        )
        .await;
    }

    Ok(ApiResponse::created(message))
}

/// Mark the other side's messages read.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn mark_read(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<ApiResponse<()>> {
    let conversation = visible_conversation(&state, &user, id).await?;
    let marked = ChatRepository::new(state.pool())
        .mark_read(id, is_staff(&user, &conversation))
        .await?;
    Ok(ApiResponse::message(format!("{marked} messages marked read")))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn close(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<ApiResponse<()>> {
    ChatRepository::new(state.pool()).close(id).await?;
    tracing::info!(conversation_id = %id, "Chat closed");
    Ok(ApiResponse::message("Conversation closed"))
}
