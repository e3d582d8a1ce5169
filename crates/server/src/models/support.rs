//! Support tickets and chat.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_core::{
    ChatMessageId, ConversationId, ConversationStatus, OrderId, TicketId, TicketMessageId,
    TicketPriority, TicketStatus, UserId,
};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: TicketId,
    pub ticket_number: String,
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub subject: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub assigned_to: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TicketMessage {
    pub id: TicketMessageId,
    pub ticket_id: TicketId,
    pub author_id: UserId,
    pub author_name: String,
    pub is_staff: bool,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A ticket with its thread, oldest message first.
#[derive(Debug, Clone, Serialize)]
pub struct TicketThread {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: ConversationId,
    pub customer_id: UserId,
    pub customer_name: String,
    pub subject: Option<String>,
    pub status: ConversationStatus,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub is_staff: bool,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Result of polling a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesPage {
    pub status: ConversationStatus,
    pub messages: Vec<ChatMessage>,
    /// Cursor to send as `after` on the next poll.
    pub cursor: Option<ChatMessageId>,
}

impl MessagesPage {
    /// Build a page; the cursor stays at `after` when nothing is new.
    #[must_use]
    pub fn new(
        status: ConversationStatus,
        messages: Vec<ChatMessage>,
        after: Option<ChatMessageId>,
    ) -> Self {
        let cursor = messages.last().map(|m| m.id).or(after);
        Self {
            status,
            messages,
            cursor,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn message(id: i32) -> ChatMessage {
        ChatMessage {
            id: ChatMessageId::new(id),
            conversation_id: ConversationId::new(1),
            sender_id: UserId::new(2),
            sender_name: "Staff".to_owned(),
            is_staff: true,
            body: "hi".to_owned(),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cursor_advances_to_last_message() {
        let page = MessagesPage::new(
            ConversationStatus::Open,
            vec![message(4), message(7)],
            Some(ChatMessageId::new(3)),
        );
        assert_eq!(page.cursor, Some(ChatMessageId::new(7)));
    }

    #[test]
    fn test_cursor_stays_when_nothing_new() {
        let page = MessagesPage::new(
            ConversationStatus::Open,
            Vec::new(),
            Some(ChatMessageId::new(3)),
        );
        assert_eq!(page.cursor, Some(ChatMessageId::new(3)));

        let empty = MessagesPage::new(ConversationStatus::Closed, Vec::new(), None);
        assert_eq!(empty.cursor, None);
    }
}
