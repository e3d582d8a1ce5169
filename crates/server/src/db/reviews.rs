//! Product review repository.

use sqlx::PgPool;

use bazaar_core::{ProductId, ReviewId, UserId};

use super::{Page, RepositoryError, conflict_on_unique};
use crate::models::{Review, ReviewSummary};

const REVIEW_SELECT: &str = r"
    SELECT r.id, r.product_id, r.user_id, u.name AS author_name, r.rating, r.title, r.body,
           r.is_verified, r.is_approved, r.created_at
    FROM shop.reviews r
    JOIN shop.users u ON u.id = r.user_id
";

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Approved reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn approved_for_product(
        &self,
        product_id: ProductId,
        page: Page,
    ) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, Review>(&format!(
            r"
            {REVIEW_SELECT}
            WHERE r.product_id = $1 AND r.is_approved
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(product_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Average rating and count over approved reviews.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self, product_id: ProductId) -> Result<ReviewSummary, RepositoryError> {
        let summary = sqlx::query_as::<_, ReviewSummary>(
            r"
            SELECT AVG(rating)::float8 AS average_rating, COUNT(*) AS review_count
            FROM shop.reviews
            WHERE product_id = $1 AND is_approved
            ",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(summary)
    }

    /// All reviews for moderation, optionally filtered by approval.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        approved: Option<bool>,
        page: Page,
    ) -> Result<(Vec<Review>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, Review>(&format!(
            r"
            {REVIEW_SELECT}
            WHERE ($1::bool IS NULL OR r.is_approved = $1)
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(approved)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shop.reviews WHERE ($1::bool IS NULL OR is_approved = $1)",
        )
        .bind(approved)
        .fetch_one(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Whether the user has a delivered order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_delivered_purchase(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let found = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM shop.orders o
                JOIN shop.order_items oi ON oi.order_id = o.id
                WHERE o.user_id = $1 AND oi.product_id = $2 AND o.status = 'delivered'
            )
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(found)
    }

    /// Create an unapproved review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the
    /// product.
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: i16,
        title: Option<&str>,
        body: &str,
        is_verified: bool,
    ) -> Result<ReviewId, RepositoryError> {
        let id = sqlx::query_scalar::<_, ReviewId>(
            r"
            INSERT INTO shop.reviews (product_id, user_id, rating, title, body, is_verified)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(title)
        .bind(body)
        .bind(is_verified)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("you have already reviewed this product"))?;

        Ok(id)
    }

    /// Get a review by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, Review>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row)
    }

    /// Approve or unapprove a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn set_approved(&self, id: ReviewId, approved: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE shop.reviews SET is_approved = $2 WHERE id = $1")
            .bind(id)
            .bind(approved)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if nothing was deleted.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.reviews WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
