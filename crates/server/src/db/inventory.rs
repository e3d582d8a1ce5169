//! Warehouse, inventory level and stock transfer repository.
//!
//! Every write re-checks `0 <= reserved <= quantity` in SQL so that a
//! concurrent change between the domain check and the write cannot break
//! it; the table CHECK constraint is the last line.

use sqlx::PgPool;

use bazaar_core::{ProductId, StockTransferId, TransferStatus, UserId, WarehouseId};

use super::{Page, RepositoryError, conflict_on_unique};
use crate::models::{InventoryLevel, StockMovement, StockTransfer, TransferItem, Warehouse};

const WAREHOUSE_COLUMNS: &str = "id, name, code, address, is_active, created_at, updated_at";

const LEVEL_SELECT: &str = r"
    SELECT i.warehouse_id, i.product_id, p.name AS product_name, p.sku,
           i.quantity, i.reserved, i.quantity - i.reserved AS available, i.updated_at
    FROM shop.inventory i
    JOIN shop.products p ON p.id = i.product_id
";

const TRANSFER_COLUMNS: &str = "id, from_warehouse_id, to_warehouse_id, items, status, notes, \
                                created_by, created_at, updated_at";

fn check_violation(message: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    let message = message.to_owned();
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_check_violation()
        {
            return RepositoryError::Conflict(message);
        }
        RepositoryError::Database(e)
    }
}

/// Warehouse fields supplied on create and update.
#[derive(Debug, Clone)]
pub struct WarehouseInput<'a> {
    pub name: &'a str,
    pub code: &'a str,
    pub address: Option<&'a str>,
    pub is_active: bool,
}

/// Repository for warehouses, inventory and transfers.
pub struct InventoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InventoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Warehouses
    // =========================================================================

    /// List warehouses by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn warehouses(&self) -> Result<Vec<Warehouse>, RepositoryError> {
        let rows = sqlx::query_as::<_, Warehouse>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM shop.warehouses ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Get a warehouse by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>, RepositoryError> {
        let row = sqlx::query_as::<_, Warehouse>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM shop.warehouses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Create a warehouse.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create_warehouse(
        &self,
        input: &WarehouseInput<'_>,
    ) -> Result<Warehouse, RepositoryError> {
        let row = sqlx::query_as::<_, Warehouse>(&format!(
            r"
            INSERT INTO shop.warehouses (name, code, address, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING {WAREHOUSE_COLUMNS}
            "
        ))
        .bind(input.name)
        .bind(input.code)
        .bind(input.address)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("warehouse code already exists"))?;

        Ok(row)
    }

    /// Replace a warehouse's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update_warehouse(
        &self,
        id: WarehouseId,
        input: &WarehouseInput<'_>,
    ) -> Result<Warehouse, RepositoryError> {
        sqlx::query_as::<_, Warehouse>(&format!(
            r"
            UPDATE shop.warehouses
            SET name = $2, code = $3, address = $4, is_active = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {WAREHOUSE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name)
        .bind(input.code)
        .bind(input.address)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("warehouse code already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a warehouse that holds no stock and has no transfers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` when stock or transfers reference
    /// it and `RepositoryError::NotFound` if it does not exist.
    pub async fn delete_warehouse(&self, id: WarehouseId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let in_use = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (SELECT 1 FROM shop.inventory WHERE warehouse_id = $1 AND quantity > 0)
                OR EXISTS (SELECT 1 FROM shop.stock_transfers
                           WHERE from_warehouse_id = $1 OR to_warehouse_id = $1)
            ",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if in_use {
            return Err(RepositoryError::Conflict(
                "warehouse still holds stock or has transfers".to_owned(),
            ));
        }

        let result = sqlx::query("DELETE FROM shop.warehouses WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Inventory levels
    // =========================================================================

    /// Inventory rows of a warehouse, by product name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn levels(
        &self,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<InventoryLevel>, RepositoryError> {
        let rows = sqlx::query_as::<_, InventoryLevel>(&format!(
            "{LEVEL_SELECT} WHERE i.warehouse_id = $1 ORDER BY p.name"
        ))
        .bind(warehouse_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// One inventory row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn level(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<Option<InventoryLevel>, RepositoryError> {
        let row = sqlx::query_as::<_, InventoryLevel>(&format!(
            "{LEVEL_SELECT} WHERE i.warehouse_id = $1 AND i.product_id = $2"
        ))
        .bind(warehouse_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Set quantity and reserved for a (warehouse, product) pair, creating
    /// the row if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the values break
    /// `0 <= reserved <= quantity`.
    pub async fn set_level(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i32,
        reserved: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.inventory (warehouse_id, product_id, quantity, reserved)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (warehouse_id, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, reserved = EXCLUDED.reserved,
                          updated_at = NOW()
            ",
        )
        .bind(warehouse_id)
        .bind(product_id)
        .bind(quantity)
        .bind(reserved)
        .execute(self.pool)
        .await
        .map_err(check_violation("reserved must be between 0 and quantity"))?;

        Ok(())
    }

    /// Add a signed `delta` to quantity. Rejected when the result would drop
    /// below the reserved amount (or below zero for a new row).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` when the guard rejects the change.
    pub async fn adjust(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        delta: i32,
    ) -> Result<(), RepositoryError> {
        let updated = sqlx::query_scalar::<_, i32>(
            r"
            INSERT INTO shop.inventory AS inv (warehouse_id, product_id, quantity, reserved)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (warehouse_id, product_id)
            DO UPDATE SET quantity = inv.quantity + $3, updated_at = NOW()
            WHERE inv.quantity + $3 >= inv.reserved
            RETURNING quantity
            ",
        )
        .bind(warehouse_id)
        .bind(product_id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await
        .map_err(check_violation("adjustment would make quantity negative"))?;

        if updated.is_none() {
            return Err(RepositoryError::Conflict(
                "adjustment would drop quantity below reserved".to_owned(),
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Stock transfers
    // =========================================================================

    /// Create a pending transfer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_transfer(
        &self,
        from: WarehouseId,
        to: WarehouseId,
        items: &[TransferItem],
        notes: Option<&str>,
        created_by: UserId,
    ) -> Result<StockTransfer, RepositoryError> {
        let row = sqlx::query_as::<_, StockTransfer>(&format!(
            r"
            INSERT INTO shop.stock_transfers (from_warehouse_id, to_warehouse_id, items, notes, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TRANSFER_COLUMNS}
            "
        ))
        .bind(from)
        .bind(to)
        .bind(sqlx::types::Json(items))
        .bind(notes)
        .bind(created_by)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// List transfers, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transfers(
        &self,
        status: Option<TransferStatus>,
        page: Page,
    ) -> Result<(Vec<StockTransfer>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, StockTransfer>(&format!(
            r"
            SELECT {TRANSFER_COLUMNS} FROM shop.stock_transfers
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shop.stock_transfers WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Get a transfer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transfer(
        &self,
        id: StockTransferId,
    ) -> Result<Option<StockTransfer>, RepositoryError> {
        let row = sqlx::query_as::<_, StockTransfer>(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM shop.stock_transfers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Move a transfer from `current` to `next` and apply its stock movement,
    /// all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the status changed since it was
    /// read or the source warehouse lacks available stock.
    pub async fn transition_transfer(
        &self,
        id: StockTransferId,
        current: TransferStatus,
        next: TransferStatus,
    ) -> Result<StockTransfer, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let transfer = sqlx::query_as::<_, StockTransfer>(&format!(
            r"
            UPDATE shop.stock_transfers SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {TRANSFER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(current)
        .bind(next)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            RepositoryError::Conflict("transfer status changed concurrently".to_owned())
        })?;

        match StockMovement::for_transition(current, next) {
            Some(StockMovement::RemoveFromSource) => {
                for item in &transfer.items {
                    let result = sqlx::query(
                        r"
                        UPDATE shop.inventory
                        SET quantity = quantity - $3, updated_at = NOW()
                        WHERE warehouse_id = $1 AND product_id = $2
                          AND quantity - reserved >= $3
                        ",
                    )
                    .bind(transfer.from_warehouse_id)
                    .bind(item.product_id)
                    .bind(item.quantity)
                    .execute(&mut *tx)
                    .await?;

                    if result.rows_affected() == 0 {
                        return Err(RepositoryError::Conflict(format!(
                            "insufficient available stock of product {} in source warehouse",
                            item.product_id
                        )));
                    }
                }
            }
            Some(StockMovement::AddToDestination) => {
                add_items(&mut tx, transfer.to_warehouse_id, &transfer.items).await?;
            }
            Some(StockMovement::ReturnToSource) => {
                add_items(&mut tx, transfer.from_warehouse_id, &transfer.items).await?;
            }
            None => {}
        }

        tx.commit().await?;
        Ok(transfer)
    }
}

async fn add_items(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    warehouse_id: WarehouseId,
    items: &[TransferItem],
) -> Result<(), sqlx::Error> {
    for item in items {
        sqlx::query(
            r"
            INSERT INTO shop.inventory AS inv (warehouse_id, product_id, quantity, reserved)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (warehouse_id, product_id)
            DO UPDATE SET quantity = inv.quantity + EXCLUDED.quantity, updated_at = NOW()
            ",
        )
        .bind(warehouse_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
