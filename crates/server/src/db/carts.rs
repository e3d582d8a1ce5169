//! Cart repository. Each user has exactly one cart, stored as lines in
//! `shop.cart_items`.

use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::{CartItemId, ProductId, UserId, VariantId};

use super::RepositoryError;
use crate::models::CartItem;

const CART_SELECT: &str = r"
    SELECT ci.id, ci.product_id, ci.variant_id,
           p.name AS product_name, v.name AS variant_name,
           COALESCE(v.sku, p.sku) AS sku,
           p.images[1] AS image,
           ci.quantity, ci.unit_price,
           ci.unit_price * ci.quantity AS line_total
    FROM shop.cart_items ci
    JOIN shop.products p ON p.id = ci.product_id
    LEFT JOIN shop.variants v ON v.id = ci.variant_id
";

/// Repository for shopping carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the lines of a user's cart in the order they were added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let items = sqlx::query_as::<_, CartItem>(&format!(
            "{CART_SELECT} WHERE ci.user_id = $1 ORDER BY ci.created_at, ci.id"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }

    /// Get one line of a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn item(
        &self,
        user_id: UserId,
        id: CartItemId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let item = sqlx::query_as::<_, CartItem>(&format!(
            "{CART_SELECT} WHERE ci.user_id = $1 AND ci.id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(item)
    }

    /// Quantity already in the cart for a product/variant pair.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity_of(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<i32, RepositoryError> {
        let quantity = sqlx::query_scalar::<_, i32>(
            r"
            SELECT quantity FROM shop.cart_items
            WHERE user_id = $1 AND product_id = $2
              AND COALESCE(variant_id, 0) = COALESCE($3, 0)
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(variant_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    /// Add `quantity` of a product/variant. An existing line for the same
    /// pair is merged and its price refreshed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a concurrent add created the
    /// same line first.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<CartItemId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_scalar::<_, CartItemId>(
            r"
            SELECT id FROM shop.cart_items
            WHERE user_id = $1 AND product_id = $2
              AND COALESCE(variant_id, 0) = COALESCE($3, 0)
            FOR UPDATE
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(variant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let id = if let Some(id) = existing {
            sqlx::query(
                r"
                UPDATE shop.cart_items
                SET quantity = quantity + $2, unit_price = $3, updated_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(id)
            .bind(quantity)
            .bind(unit_price)
            .execute(&mut *tx)
            .await?;
            id
        } else {
            sqlx::query_scalar::<_, CartItemId>(
                r"
                INSERT INTO shop.cart_items (user_id, product_id, variant_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                ",
            )
            .bind(user_id)
            .bind(product_id)
            .bind(variant_id)
            .bind(quantity)
            .bind(unit_price)
            .fetch_one(&mut *tx)
            .await
            .map_err(super::conflict_on_unique("cart line was modified concurrently"))?
        };

        tx.commit().await?;
        Ok(id)
    }

    /// Set the quantity of one line and refresh its price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in the user's cart.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        id: CartItemId,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.cart_items
            SET quantity = $3, unit_price = $4, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(quantity)
        .bind(unit_price)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove one line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in the user's cart.
    pub async fn remove(&self, user_id: UserId, id: CartItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.cart_items WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
