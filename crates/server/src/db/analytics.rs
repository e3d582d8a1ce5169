//! Read-only aggregate queries for the admin analytics summary.
//!
//! Every query covers the trailing `days` window ending now and excludes
//! cancelled orders from revenue.

use sqlx::PgPool;

use super::RepositoryError;
use crate::models::{DailyRevenue, RevenueTotals, StatusCount, TopProduct};

/// Repository for analytics aggregates.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Revenue and order count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue_totals(&self, days: i32) -> Result<RevenueTotals, RepositoryError> {
        let totals = sqlx::query_as::<_, RevenueTotals>(
            r"
            SELECT COALESCE(SUM(total), 0) AS revenue, COUNT(*) AS order_count
            FROM shop.orders
            WHERE status <> 'cancelled' AND created_at >= NOW() - make_interval(days => $1)
            ",
        )
        .bind(days)
        .fetch_one(self.pool)
        .await?;

        Ok(totals)
    }

    /// Total shopper accounts and those created inside the window.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customer_counts(&self, days: i32) -> Result<(i64, i64), RepositoryError> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE created_at >= NOW() - make_interval(days => $1))
            FROM shop.users
            WHERE role = 'user'
            ",
        )
        .bind(days)
        .fetch_one(self.pool)
        .await?;

        Ok(counts)
    }

    /// Order counts per status, including cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn orders_by_status(&self, days: i32) -> Result<Vec<StatusCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, StatusCount>(
            r"
            SELECT status, COUNT(*) AS count
            FROM shop.orders
            WHERE created_at >= NOW() - make_interval(days => $1)
            GROUP BY status
            ORDER BY status
            ",
        )
        .bind(days)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// One entry per calendar day in the window, zero-filled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn daily_revenue(&self, days: i32) -> Result<Vec<DailyRevenue>, RepositoryError> {
        let rows = sqlx::query_as::<_, DailyRevenue>(
            r"
            SELECT d::date AS day,
                   COALESCE(SUM(o.total), 0) AS revenue,
                   COUNT(o.id) AS orders
            FROM generate_series(
                (NOW() - make_interval(days => $1 - 1))::date,
                NOW()::date,
                INTERVAL '1 day'
            ) AS d
            LEFT JOIN shop.orders o
                ON o.created_at::date = d::date AND o.status <> 'cancelled'
            GROUP BY d
            ORDER BY d
            ",
        )
        .bind(days)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Best sellers by units sold.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(
        &self,
        days: i32,
        limit: i64,
    ) -> Result<Vec<TopProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, TopProduct>(
            r"
            SELECT oi.product_id, p.name,
                   SUM(oi.quantity)::bigint AS units_sold,
                   SUM(oi.line_total) AS revenue
            FROM shop.order_items oi
            JOIN shop.orders o ON o.id = oi.order_id
            JOIN shop.products p ON p.id = oi.product_id
            WHERE o.status <> 'cancelled' AND o.created_at >= NOW() - make_interval(days => $1)
            GROUP BY oi.product_id, p.name
            ORDER BY units_sold DESC, revenue DESC
            LIMIT $2
            ",
        )
        .bind(days)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
