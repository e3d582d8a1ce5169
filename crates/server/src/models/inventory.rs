//! Warehouse, inventory and stock transfer types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use bazaar_core::{ProductId, StockTransferId, TransferStatus, UserId, WarehouseId};

/// A stock location.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub code: String,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stock of one product in one warehouse.
///
/// `0 <= reserved <= quantity` always holds; `available = quantity - reserved`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InventoryLevel {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub quantity: i32,
    pub reserved: i32,
    pub available: i32,
    pub updated_at: DateTime<Utc>,
}

/// One product line of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TransferItem {
    pub product_id: ProductId,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Movement of stock between two warehouses.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StockTransfer {
    pub id: StockTransferId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    #[sqlx(json)]
    pub items: Vec<TransferItem>,
    pub status: TransferStatus,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product at or below the low-stock threshold.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LowStockProduct {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub stock: i32,
}

/// Stock movement caused by a transfer status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMovement {
    /// `pending -> in_transit`: quantities leave the source warehouse.
    RemoveFromSource,
    /// `in_transit -> completed`: quantities arrive at the destination.
    AddToDestination,
    /// `in_transit -> cancelled`: quantities go back to the source.
    ReturnToSource,
}

impl StockMovement {
    /// Movement for `current -> next`, or `None` when stock is untouched.
    ///
    /// Callers check `TransferStatus::can_transition_to` first.
    #[must_use]
    pub const fn for_transition(current: TransferStatus, next: TransferStatus) -> Option<Self> {
        match (current, next) {
            (TransferStatus::Pending, TransferStatus::InTransit) => Some(Self::RemoveFromSource),
            (TransferStatus::InTransit, TransferStatus::Completed) => Some(Self::AddToDestination),
            (TransferStatus::InTransit, TransferStatus::Cancelled) => Some(Self::ReturnToSource),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_per_transition() {
        use TransferStatus::*;
        assert_eq!(
            StockMovement::for_transition(Pending, InTransit),
            Some(StockMovement::RemoveFromSource)
        );
        assert_eq!(
            StockMovement::for_transition(InTransit, Completed),
            Some(StockMovement::AddToDestination)
        );
        assert_eq!(
            StockMovement::for_transition(InTransit, Cancelled),
            Some(StockMovement::ReturnToSource)
        );
        assert_eq!(StockMovement::for_transition(Pending, Cancelled), None);
    }
}
