//! Support chat repository. Clients poll with a message ID cursor.

use sqlx::PgPool;

use bazaar_core::{ChatMessageId, ConversationId, ConversationStatus, UserId};

use super::RepositoryError;
use crate::models::{ChatMessage, Conversation};

const CONVERSATION_SELECT: &str = r"
    SELECT c.id, c.customer_id, u.name AS customer_name, c.subject, c.status,
           c.last_message_at, c.created_at
    FROM shop.chat_conversations c
    JOIN shop.users u ON u.id = c.customer_id
";

const MESSAGE_SELECT: &str = r"
    SELECT m.id, m.conversation_id, m.sender_id, u.name AS sender_name, m.is_staff, m.body,
           m.is_read, m.created_at
    FROM shop.chat_messages m
    JOIN shop.users u ON u.id = m.sender_id
";

/// Largest number of messages returned by one poll.
pub const MAX_POLL_MESSAGES: i64 = 200;

/// Repository for chat conversations and messages.
pub struct ChatRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ChatRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List conversations, most recent activity first. `customer_id`
    /// restricts to one customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn conversations(
        &self,
        customer_id: Option<UserId>,
        status: Option<ConversationStatus>,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query_as::<_, Conversation>(&format!(
            r"
            {CONVERSATION_SELECT}
            WHERE ($1::int IS NULL OR c.customer_id = $1)
              AND ($2::text IS NULL OR c.status = $2)
            ORDER BY COALESCE(c.last_message_at, c.created_at) DESC, c.id DESC
            "
        ))
        .bind(customer_id)
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Get a conversation by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query_as::<_, Conversation>(&format!("{CONVERSATION_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row)
    }

    /// Open a conversation with its first message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn open(
        &self,
        customer_id: UserId,
        subject: Option<&str>,
        message: &str,
    ) -> Result<ConversationId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, ConversationId>(
            r"
            INSERT INTO shop.chat_conversations (customer_id, subject, last_message_at)
            VALUES ($1, $2, NOW())
            RETURNING id
            ",
        )
        .bind(customer_id)
        .bind(subject)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO shop.chat_messages (conversation_id, sender_id, is_staff, body)
            VALUES ($1, $2, FALSE, $3)
            ",
        )
        .bind(id)
        .bind(customer_id)
        .bind(message)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Messages newer than `after` (all messages when `None`), oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn messages_after(
        &self,
        conversation_id: ConversationId,
        after: Option<ChatMessageId>,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ChatMessage>(&format!(
            r"
            {MESSAGE_SELECT}
            WHERE m.conversation_id = $1 AND ($2::int IS NULL OR m.id > $2)
            ORDER BY m.id
            LIMIT $3
            "
        ))
        .bind(conversation_id)
        .bind(after)
        .bind(MAX_POLL_MESSAGES)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Post a message to an open conversation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the conversation is closed and
    /// `RepositoryError::NotFound` if it does not exist.
    pub async fn post(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        is_staff: bool,
        body: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let status = sqlx::query_scalar::<_, ConversationStatus>(
            "SELECT status FROM shop.chat_conversations WHERE id = $1 FOR UPDATE",
        )
        .bind(conversation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if status == ConversationStatus::Closed {
            return Err(RepositoryError::Conflict("conversation is closed".to_owned()));
        }

        let message = sqlx::query_as::<_, ChatMessage>(
            r"
            WITH m AS (
                INSERT INTO shop.chat_messages (conversation_id, sender_id, is_staff, body)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT m.id, m.conversation_id, m.sender_id, u.name AS sender_name, m.is_staff,
                   m.body, m.is_read, m.created_at
            FROM m
            JOIN shop.users u ON u.id = m.sender_id
            ",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(is_staff)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE shop.chat_conversations SET last_message_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Mark every message sent by the other side as read. `reader_is_staff`
    /// tells which side is reading. Returns the number of messages changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_read(
        &self,
        conversation_id: ConversationId,
        reader_is_staff: bool,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.chat_messages SET is_read = TRUE
            WHERE conversation_id = $1 AND is_staff <> $2 AND NOT is_read
            ",
        )
        .bind(conversation_id)
        .bind(reader_is_staff)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Close a conversation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the conversation does not exist.
    pub async fn close(&self, id: ConversationId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE shop.chat_conversations SET status = 'closed' WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
