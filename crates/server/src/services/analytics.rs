//! Admin analytics summary, cached for a minute per window size.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use bazaar_core::round_money;

use crate::db::{AnalyticsRepository, ProductRepository, RepositoryError};
use crate::models::AnalyticsSummary;

/// Window used when none is requested.
pub const DEFAULT_DAYS: u32 = 30;

/// Longest window accepted.
pub const MAX_DAYS: u32 = 365;

const TOP_PRODUCTS: i64 = 10;

const CACHE_TTL: Duration = Duration::from_secs(60);

/// The window to report on, or `None` if `requested` is out of range.
#[must_use]
pub fn window_days(requested: Option<u32>) -> Option<u32> {
    match requested {
        None => Some(DEFAULT_DAYS),
        Some(days) if (1..=MAX_DAYS).contains(&days) => Some(days),
        Some(_) => None,
    }
}

/// Revenue divided by order count, zero when there are no orders.
#[must_use]
pub fn average_order_value(revenue: Decimal, order_count: i64) -> Decimal {
    if order_count <= 0 {
        return Decimal::ZERO;
    }
    round_money(revenue / Decimal::from(order_count))
}

/// Computes summaries and keeps them for [`CACHE_TTL`].
#[derive(Clone)]
pub struct AnalyticsService {
    cache: Cache<u32, Arc<AnalyticsSummary>>,
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyticsService {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(u64::from(MAX_DAYS))
            .time_to_live(CACHE_TTL)
            .build();
        Self { cache }
    }

    /// Summary for the trailing `days`, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if any aggregate query fails.
    #[instrument(skip(self, pool))]
    pub async fn summary(
        &self,
        pool: &PgPool,
        days: u32,
        low_stock_threshold: i32,
    ) -> Result<Arc<AnalyticsSummary>, RepositoryError> {
        if let Some(cached) = self.cache.get(&days).await {
            tracing::debug!(days, "Analytics cache hit");
            return Ok(cached);
        }

        let summary = Arc::new(compute(pool, days, low_stock_threshold).await?);
        self.cache.insert(days, Arc::clone(&summary)).await;
        Ok(summary)
    }
}

async fn compute(
    pool: &PgPool,
    days: u32,
    low_stock_threshold: i32,
) -> Result<AnalyticsSummary, RepositoryError> {
    let repo = AnalyticsRepository::new(pool);
    let window = i32::try_from(days).unwrap_or(i32::MAX);

    let totals = repo.revenue_totals(window).await?;
    let (total_customers, new_customers) = repo.customer_counts(window).await?;
    let orders_by_status = repo.orders_by_status(window).await?;
    let daily_revenue = repo.daily_revenue(window).await?;
    let top_products = repo.top_products(window, TOP_PRODUCTS).await?;
    let low_stock = ProductRepository::new(pool)
        .low_stock(low_stock_threshold)
        .await?;

    Ok(AnalyticsSummary {
        days,
        revenue: totals.revenue,
        order_count: totals.order_count,
        average_order_value: average_order_value(totals.revenue, totals.order_count),
        total_customers,
        new_customers,
        orders_by_status,
        daily_revenue,
        top_products,
        low_stock,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_days_bounds() {
        assert_eq!(window_days(None), Some(30));
        assert_eq!(window_days(Some(1)), Some(1));
        assert_eq!(window_days(Some(365)), Some(365));
        assert_eq!(window_days(Some(0)), None);
        assert_eq!(window_days(Some(366)), None);
    }

    #[test]
    fn test_average_order_value() {
        assert_eq!(average_order_value(Decimal::ZERO, 0), Decimal::ZERO);
        assert_eq!(
            average_order_value(Decimal::new(10000, 2), 3),
            Decimal::new(3333, 2)
        );
    }
}
