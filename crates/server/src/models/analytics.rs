//! Admin analytics summary.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use bazaar_core::{OrderStatus, ProductId};

use super::LowStockProduct;

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub days: u32,
    /// Excludes cancelled orders.
    pub revenue: Decimal,
    /// Excludes cancelled orders.
    pub order_count: i64,
    pub average_order_value: Decimal,
    pub total_customers: i64,
    pub new_customers: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub daily_revenue: Vec<DailyRevenue>,
    pub top_products: Vec<TopProduct>,
    pub low_stock: Vec<LowStockProduct>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailyRevenue {
    pub day: NaiveDate,
    pub revenue: Decimal,
    pub orders: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// Revenue totals for a window.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct RevenueTotals {
    pub revenue: Decimal,
    pub order_count: i64,
}
