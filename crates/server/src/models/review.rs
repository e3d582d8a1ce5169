//! Product review types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_core::{ProductId, ReviewId, UserId};

/// A shopper's review of a product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub author_name: String,
    pub rating: i16,
    pub title: Option<String>,
    pub body: String,
    /// The author has a delivered order containing the product.
    pub is_verified: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Aggregate over approved reviews.
#[derive(Debug, Clone, Copy, Serialize, sqlx::FromRow)]
pub struct ReviewSummary {
    pub average_rating: Option<f64>,
    pub review_count: i64,
}
