//! Warehouse inventory rules and stock transfers.
//!
//! The rules are checked here before touching the database; the SQL in
//! [`InventoryRepository`] guards them again against concurrent writers.

use std::collections::BTreeMap;

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use bazaar_core::{ProductId, StockTransferId, TransferStatus, UserId, WarehouseId};

use crate::db::{InventoryRepository, ProductRepository, RepositoryError};
use crate::models::{StockTransfer, TransferItem};

/// Inventory rule violations.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("not found")]
    NotFound,

    #[error("quantity and reserved must not be negative")]
    Negative,

    #[error("reserved ({reserved}) cannot exceed quantity ({quantity})")]
    ReservedExceedsQuantity { quantity: i32, reserved: i32 },

    #[error("source and destination warehouse must differ")]
    SameWarehouse,

    #[error("a transfer needs at least one item")]
    EmptyItems,

    #[error("transfer quantities must be positive")]
    NonPositiveQuantity,

    #[error("resulting quantity is out of range")]
    QuantityOutOfRange,

    #[error("cannot move a transfer from {from} to {to}")]
    InvalidTransition {
        from: TransferStatus,
        to: TransferStatus,
    },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Check `0 <= reserved <= quantity`.
///
/// # Errors
///
/// Returns `InventoryError::Negative` or
/// `InventoryError::ReservedExceedsQuantity`.
pub const fn check_level(quantity: i32, reserved: i32) -> Result<(), InventoryError> {
    if quantity < 0 || reserved < 0 {
        return Err(InventoryError::Negative);
    }
    if reserved > quantity {
        return Err(InventoryError::ReservedExceedsQuantity { quantity, reserved });
    }
    Ok(())
}

/// Apply a signed delta to a level, returning the new quantity.
///
/// # Errors
///
/// Returns `InventoryError::QuantityOutOfRange` when the sum overflows,
/// `InventoryError::Negative` or `InventoryError::ReservedExceedsQuantity`.
pub fn check_adjustment(quantity: i32, reserved: i32, delta: i32) -> Result<i32, InventoryError> {
    let next = quantity
        .checked_add(delta)
        .ok_or(InventoryError::QuantityOutOfRange)?;
    check_level(next, reserved)?;
    Ok(next)
}

/// SQLSTATE `numeric_value_out_of_range`.
const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// Integer overflow in the database becomes a client error.
fn out_of_range(err: RepositoryError) -> InventoryError {
    if let RepositoryError::Database(sqlx::Error::Database(ref db_err)) = err
        && db_err.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE)
    {
        return InventoryError::QuantityOutOfRange;
    }
    InventoryError::Repository(err)
}

/// Validate a new transfer and merge repeated products into one line each.
///
/// # Errors
///
/// Returns `InventoryError::SameWarehouse`, `InventoryError::EmptyItems` or
/// `InventoryError::NonPositiveQuantity`.
pub fn normalize_transfer(
    from: WarehouseId,
    to: WarehouseId,
    items: &[TransferItem],
) -> Result<Vec<TransferItem>, InventoryError> {
    if from == to {
        return Err(InventoryError::SameWarehouse);
    }
    if items.is_empty() {
        return Err(InventoryError::EmptyItems);
    }

    let mut merged: BTreeMap<i32, i32> = BTreeMap::new();
    for item in items {
        if item.quantity <= 0 {
            return Err(InventoryError::NonPositiveQuantity);
        }
        let total = merged.entry(item.product_id.as_i32()).or_insert(0);
        *total = total
            .checked_add(item.quantity)
            .ok_or(InventoryError::NonPositiveQuantity)?;
    }

    Ok(merged
        .into_iter()
        .map(|(product_id, quantity)| TransferItem {
            product_id: ProductId::new(product_id),
            quantity,
        })
        .collect())
}

/// Check a transfer status change.
///
/// # Errors
///
/// Returns `InventoryError::InvalidTransition`.
pub const fn check_transfer_transition(
    current: TransferStatus,
    next: TransferStatus,
) -> Result<(), InventoryError> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(InventoryError::InvalidTransition {
            from: current,
            to: next,
        })
    }
}

/// Inventory operations.
pub struct InventoryService<'a> {
    inventory: InventoryRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> InventoryService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            inventory: InventoryRepository::new(pool),
            products: ProductRepository::new(pool),
        }
    }

    async fn ensure_warehouse(&self, id: WarehouseId) -> Result<(), InventoryError> {
        self.inventory
            .warehouse(id)
            .await?
            .map(|_| ())
            .ok_or(InventoryError::NotFound)
    }

    async fn ensure_product(&self, id: ProductId) -> Result<(), InventoryError> {
        self.products
            .get(id)
            .await?
            .map(|_| ())
            .ok_or(InventoryError::NotFound)
    }

    /// Set a warehouse inventory row.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError` if the level is invalid or the warehouse or
    /// product does not exist.
    #[instrument(skip(self))]
    pub async fn set_level(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i32,
        reserved: i32,
    ) -> Result<(), InventoryError> {
        check_level(quantity, reserved)?;
        self.ensure_warehouse(warehouse_id).await?;
        self.ensure_product(product_id).await?;
        self.inventory
            .set_level(warehouse_id, product_id, quantity, reserved)
            .await?;
        Ok(())
    }

    /// Adjust quantity by a signed delta.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::ReservedExceedsQuantity`, `Negative` or
    /// `QuantityOutOfRange` when the result is invalid, and a repository
    /// conflict when a concurrent write got there first.
    #[instrument(skip(self))]
    pub async fn adjust(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        delta: i32,
    ) -> Result<(), InventoryError> {
        self.ensure_warehouse(warehouse_id).await?;
        self.ensure_product(product_id).await?;
        let (quantity, reserved) = self
            .inventory
            .level(warehouse_id, product_id)
            .await?
            .map_or((0, 0), |level| (level.quantity, level.reserved));
        check_adjustment(quantity, reserved, delta)?;
        self.inventory
            .adjust(warehouse_id, product_id, delta)
            .await
            .map_err(out_of_range)?;
        Ok(())
    }

    /// Create a pending transfer.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError` if the transfer is invalid or references a
    /// missing warehouse.
    #[instrument(skip(self, items, notes))]
    pub async fn create_transfer(
        &self,
        from: WarehouseId,
        to: WarehouseId,
        items: &[TransferItem],
        notes: Option<&str>,
        created_by: UserId,
    ) -> Result<StockTransfer, InventoryError> {
        let items = normalize_transfer(from, to, items)?;
        self.ensure_warehouse(from).await?;
        self.ensure_warehouse(to).await?;
        for item in &items {
            self.ensure_product(item.product_id).await?;
        }

        let transfer = self
            .inventory
            .create_transfer(from, to, &items, notes, created_by)
            .await?;
        tracing::info!(transfer_id = %transfer.id, "Stock transfer created");
        Ok(transfer)
    }

    /// Move a transfer to `next`, applying its stock movement.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::InvalidTransition` for a forbidden move and a
    /// repository conflict when the source lacks available stock.
    #[instrument(skip(self))]
    pub async fn transition_transfer(
        &self,
        id: StockTransferId,
        next: TransferStatus,
    ) -> Result<StockTransfer, InventoryError> {
        let transfer = self
            .inventory
            .transfer(id)
            .await?
            .ok_or(InventoryError::NotFound)?;
        check_transfer_transition(transfer.status, next)?;

        let updated = self
            .inventory
            .transition_transfer(id, transfer.status, next)
            .await
            .map_err(out_of_range)?;
        tracing::info!(
            transfer_id = %id,
            from = %transfer.status,
            to = %updated.status,
            "Stock transfer status changed"
        );
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(product: i32, quantity: i32) -> TransferItem {
        TransferItem {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    #[test]
    fn test_level_bounds() {
        check_level(10, 0).unwrap();
        check_level(10, 10).unwrap();
        check_level(0, 0).unwrap();
        assert!(matches!(check_level(-1, 0), Err(InventoryError::Negative)));
        assert!(matches!(
            check_level(5, 6),
            Err(InventoryError::ReservedExceedsQuantity {
                quantity: 5,
                reserved: 6
            })
        ));
    }

    #[test]
    fn test_adjustment_bounds() {
        assert_eq!(check_adjustment(10, 2, 5).unwrap(), 15);
        assert_eq!(check_adjustment(10, 2, -8).unwrap(), 2);
        assert!(matches!(
            check_adjustment(10, 2, -9),
            Err(InventoryError::ReservedExceedsQuantity { .. })
        ));
        assert!(matches!(
            check_adjustment(3, 0, -4),
            Err(InventoryError::Negative)
        ));
    }

    #[test]
    fn test_adjustment_overflow_is_rejected() {
        assert!(matches!(
            check_adjustment(i32::MAX - 999_999, 0, 1_000_000),
            Err(InventoryError::QuantityOutOfRange)
        ));
        assert_eq!(
            check_adjustment(i32::MAX - 1_000_000, 0, 1_000_000).unwrap(),
            i32::MAX
        );
    }

    #[test]
    fn test_transfer_needs_distinct_warehouses() {
        let w = WarehouseId::new(1);
        assert!(matches!(
            normalize_transfer(w, w, &[item(1, 1)]),
            Err(InventoryError::SameWarehouse)
        ));
    }

    #[test]
    fn test_transfer_needs_items_with_positive_quantities() {
        let (a, b) = (WarehouseId::new(1), WarehouseId::new(2));
        assert!(matches!(
            normalize_transfer(a, b, &[]),
            Err(InventoryError::EmptyItems)
        ));
        assert!(matches!(
            normalize_transfer(a, b, &[item(1, 2), item(2, 0)]),
            Err(InventoryError::NonPositiveQuantity)
        ));
    }

    #[test]
    fn test_transfer_merges_repeated_products() {
        let items = normalize_transfer(
            WarehouseId::new(1),
            WarehouseId::new(2),
            &[item(3, 2), item(1, 1), item(3, 5)],
        )
        .unwrap();
        assert_eq!(items, vec![item(1, 1), item(3, 7)]);
    }

    #[test]
    fn test_transfer_transitions() {
        check_transfer_transition(TransferStatus::Pending, TransferStatus::InTransit).unwrap();
        check_transfer_transition(TransferStatus::InTransit, TransferStatus::Completed).unwrap();
        check_transfer_transition(TransferStatus::InTransit, TransferStatus::Cancelled).unwrap();
        assert!(
            check_transfer_transition(TransferStatus::Pending, TransferStatus::Completed).is_err()
        );
        assert!(
            check_transfer_transition(TransferStatus::Completed, TransferStatus::Cancelled)
                .is_err()
        );
    }
}
