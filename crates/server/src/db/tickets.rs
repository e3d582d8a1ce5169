//! Support ticket repository.

use sqlx::PgPool;

use bazaar_core::{OrderId, TicketId, TicketPriority, TicketStatus, UserId};

use super::{Page, RepositoryError, conflict_on_unique};
use crate::models::{Ticket, TicketMessage};

const TICKET_COLUMNS: &str = "id, ticket_number, user_id, order_id, subject, status, priority, \
                              assigned_to, created_at, updated_at";

const MESSAGE_SELECT: &str = r"
    SELECT m.id, m.ticket_id, m.author_id, u.name AS author_name, m.is_staff, m.body, m.created_at
    FROM shop.ticket_messages m
    JOIN shop.users u ON u.id = m.author_id
";

/// Admin changes to a ticket. `None` leaves a field unchanged;
/// `assigned_to: Some(None)` clears the assignee.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assigned_to: Option<Option<UserId>>,
}

/// Repository for support tickets and their messages.
pub struct TicketRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TicketRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List tickets, most recently updated first. `user_id` restricts to one
    /// owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: Option<UserId>,
        status: Option<TicketStatus>,
        page: Page,
    ) -> Result<(Vec<Ticket>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, Ticket>(&format!(
            r"
            SELECT {TICKET_COLUMNS} FROM shop.tickets
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY updated_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(user_id)
        .bind(status)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM shop.tickets
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Get a ticket by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: TicketId) -> Result<Option<Ticket>, RepositoryError> {
        let row = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM shop.tickets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Messages of a ticket, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn messages(
        &self,
        ticket_id: TicketId,
    ) -> Result<Vec<TicketMessage>, RepositoryError> {
        let rows = sqlx::query_as::<_, TicketMessage>(&format!(
            "{MESSAGE_SELECT} WHERE m.ticket_id = $1 ORDER BY m.id"
        ))
        .bind(ticket_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Open a ticket with its first message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the ticket number collides.
    pub async fn create(
        &self,
        ticket_number: &str,
        user_id: UserId,
        order_id: Option<OrderId>,
        subject: &str,
        priority: TicketPriority,
        message: &str,
    ) -> Result<Ticket, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            r"
            INSERT INTO shop.tickets (ticket_number, user_id, order_id, subject, priority)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(ticket_number)
        .bind(user_id)
        .bind(order_id)
        .bind(subject)
        .bind(priority)
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict_on_unique("ticket number already exists"))?;

        sqlx::query(
            r"
            INSERT INTO shop.ticket_messages (ticket_id, author_id, is_staff, body)
            VALUES ($1, $2, FALSE, $3)
            ",
        )
        .bind(ticket.id)
        .bind(user_id)
        .bind(message)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ticket)
    }

    /// Append a message and bump the ticket's update time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn add_message(
        &self,
        ticket_id: TicketId,
        author_id: UserId,
        is_staff: bool,
        body: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO shop.ticket_messages (ticket_id, author_id, is_staff, body)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(ticket_id)
        .bind(author_id)
        .bind(is_staff)
        .bind(body)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE shop.tickets SET updated_at = NOW() WHERE id = $1")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Apply admin changes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket does not exist.
    pub async fn update(
        &self,
        id: TicketId,
        update: TicketUpdate,
    ) -> Result<Ticket, RepositoryError> {
        sqlx::query_as::<_, Ticket>(&format!(
            r"
            UPDATE shop.tickets
            SET status = COALESCE($2, status),
                priority = COALESCE($3, priority),
                assigned_to = CASE WHEN $4 THEN $5 ELSE assigned_to END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.status)
        .bind(update.priority)
        .bind(update.assigned_to.is_some())
        .bind(update.assigned_to.flatten())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}
