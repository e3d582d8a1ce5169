//! In-app notification repository.

use sqlx::PgPool;

use bazaar_core::{NotificationId, NotificationKind, UserId};

use super::{Page, RepositoryError};
use crate::models::Notification;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, body, link, is_read, created_at";

/// Repository for user notifications.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a notification.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        title: &str,
        body: &str,
        link: Option<&str>,
    ) -> Result<Notification, RepositoryError> {
        let row = sqlx::query_as::<_, Notification>(&format!(
            r"
            INSERT INTO shop.notifications (user_id, kind, title, body, link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {NOTIFICATION_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(kind)
        .bind(title)
        .bind(body)
        .bind(link)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// A user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query_as::<_, Notification>(&format!(
            r"
            SELECT {NOTIFICATION_COLUMNS} FROM shop.notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Number of unread notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shop.notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Mark one notification read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not belong to the user.
    pub async fn mark_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark every notification of the user read. Returns the number changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete one notification.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not belong to the user.
    pub async fn delete(&self, user_id: UserId, id: NotificationId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
