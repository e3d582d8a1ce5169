//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_core::{NotificationId, NotificationKind, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationList {
    pub items: Vec<Notification>,
    pub unread_count: i64,
}
