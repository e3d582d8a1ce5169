//! Product and variant repository.
//!
//! SKUs are unique across products and variants together; the unique
//! indexes cover each table and the cross-table check runs in the same
//! transaction as the write.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use bazaar_core::{CategoryId, ProductId, Sku, Slug, VariantId};

use super::{Page, RepositoryError};
use crate::models::{LowStockProduct, Product, Variant};

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.slug, p.sku, p.description, p.price, \
     p.compare_at_price, p.sale_price, p.sale_starts_at, p.sale_ends_at, p.stock, \
     p.category_id, p.is_active, p.is_featured, p.is_on_sale, p.images, p.created_at, p.updated_at";

const VARIANT_COLUMNS: &str =
    "id, product_id, name, sku, price, stock, attributes, is_active, created_at, updated_at";

/// SQL expression for the price charged now; mirrors `Product::effective_price`.
const EFFECTIVE_PRICE_SQL: &str = "CASE WHEN p.is_on_sale AND p.sale_price IS NOT NULL \
     AND (p.sale_starts_at IS NULL OR p.sale_starts_at <= NOW()) \
     AND (p.sale_ends_at IS NULL OR NOW() < p.sale_ends_at) \
     THEN p.sale_price ELSE p.price END";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    slug: String,
    sku: String,
    description: Option<String>,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    sale_price: Option<Decimal>,
    sale_starts_at: Option<DateTime<Utc>>,
    sale_ends_at: Option<DateTime<Utc>>,
    stock: i32,
    category_id: Option<i32>,
    is_active: bool,
    is_featured: bool,
    is_on_sale: bool,
    images: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product slug in database: {e}"))
        })?;
        let sku = Sku::parse(&row.sku).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product sku in database: {e}"))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            slug,
            sku,
            description: row.description,
            price: row.price,
            compare_at_price: row.compare_at_price,
            sale_price: row.sale_price,
            sale_starts_at: row.sale_starts_at,
            sale_ends_at: row.sale_ends_at,
            stock: row.stock,
            category_id: row.category_id.map(CategoryId::new),
            is_active: row.is_active,
            is_featured: row.is_featured,
            is_on_sale: row.is_on_sale,
            images: row.images,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: i32,
    product_id: i32,
    name: String,
    sku: String,
    price: Option<Decimal>,
    stock: i32,
    attributes: serde_json::Value,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VariantRow> for Variant {
    type Error = RepositoryError;

    fn try_from(row: VariantRow) -> Result<Self, Self::Error> {
        let sku = Sku::parse(&row.sku).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid variant sku in database: {e}"))
        })?;

        Ok(Self {
            id: VariantId::new(row.id),
            product_id: ProductId::new(row.product_id),
            name: row.name,
            sku,
            price: row.price,
            stock: row.stock,
            attributes: row.attributes,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Listing sort order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    fn order_by(self) -> String {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC".to_owned(),
            Self::PriceAsc => format!("{EFFECTIVE_PRICE_SQL} ASC, p.id"),
            Self::PriceDesc => format!("{EFFECTIVE_PRICE_SQL} DESC, p.id"),
            Self::Name => "p.name ASC, p.id".to_owned(),
        }
    }
}

/// Catalog listing filters.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_slug: Option<String>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub on_sale: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
    /// Admin listings include inactive products.
    pub include_inactive: bool,
}

/// Product fields supplied on create and update.
#[derive(Debug, Clone)]
pub struct ProductInput<'a> {
    pub name: &'a str,
    pub slug: &'a Slug,
    pub sku: &'a Sku,
    pub description: Option<&'a str>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub sale_starts_at: Option<DateTime<Utc>>,
    pub sale_ends_at: Option<DateTime<Utc>>,
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    pub is_active: bool,
    pub is_featured: bool,
    pub is_on_sale: bool,
    pub images: &'a [String],
}

/// Variant fields supplied on create and update.
#[derive(Debug, Clone)]
pub struct VariantInput<'a> {
    pub name: &'a str,
    pub sku: &'a Sku,
    pub price: Option<Decimal>,
    pub stock: i32,
    pub attributes: &'a serde_json::Value,
    pub is_active: bool,
}

/// Operation applied to many products at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Activate,
    Deactivate,
    Feature,
    Unfeature,
    /// Soft delete.
    Delete,
    SetCategory(Option<CategoryId>),
}

fn product_conflict(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        let message = match db_err.constraint() {
            Some(name) if name.contains("slug") => "product slug already exists",
            _ => "sku already exists",
        };
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

async fn ensure_sku_free(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    sku: &Sku,
    except_product: Option<ProductId>,
    except_variant: Option<VariantId>,
) -> Result<(), RepositoryError> {
    let taken = sqlx::query_scalar::<_, bool>(
        r"
        SELECT EXISTS (SELECT 1 FROM shop.products WHERE sku = $1 AND id IS DISTINCT FROM $2)
            OR EXISTS (SELECT 1 FROM shop.variants WHERE sku = $1 AND id IS DISTINCT FROM $3)
        ",
    )
    .bind(sku.as_str())
    .bind(except_product)
    .bind(except_variant)
    .fetch_one(&mut **tx)
    .await?;

    if taken {
        return Err(RepositoryError::Conflict("sku already exists".to_owned()));
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for products and their variants.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));

        let where_clause = format!(
            r"
            FROM shop.products p
            LEFT JOIN shop.categories c ON c.id = p.category_id
            WHERE ($1 OR p.is_active)
              AND ($2::text IS NULL OR c.slug = $2)
              AND ($3::text IS NULL OR p.name ILIKE $3 OR p.description ILIKE $3 OR p.sku ILIKE $3)
              AND ($4::bool IS NULL OR p.is_featured = $4)
              AND ($5::bool IS NULL OR p.is_on_sale = $5)
              AND ($6::numeric IS NULL OR {EFFECTIVE_PRICE_SQL} >= $6)
              AND ($7::numeric IS NULL OR {EFFECTIVE_PRICE_SQL} <= $7)
            "
        );

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} {where_clause} ORDER BY {} LIMIT $8 OFFSET $9",
            filter.sort.order_by()
        ))
        .bind(filter.include_inactive)
        .bind(filter.category_slug.as_deref())
        .bind(pattern.as_deref())
        .bind(filter.featured)
        .bind(filter.on_sale)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) {where_clause}"))
            .bind(filter.include_inactive)
            .bind(filter.category_slug.as_deref())
            .bind(pattern.as_deref())
            .bind(filter.featured)
            .bind(filter.on_sale)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .fetch_one(self.pool)
            .await?;

        let products = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((products, total))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &Slug) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products p WHERE p.slug = $1"
        ))
        .bind(slug.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug or SKU is taken.
    pub async fn create(&self, input: &ProductInput<'_>) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ensure_sku_free(&mut tx, input.sku, None, None).await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO shop.products AS p
                (name, slug, sku, description, price, compare_at_price, sale_price,
                 sale_starts_at, sale_ends_at, stock, category_id, is_active, is_featured,
                 is_on_sale, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(input.name)
        .bind(input.slug.as_str())
        .bind(input.sku.as_str())
        .bind(input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.sale_price)
        .bind(input.sale_starts_at)
        .bind(input.sale_ends_at)
        .bind(input.stock)
        .bind(input.category_id)
        .bind(input.is_active)
        .bind(input.is_featured)
        .bind(input.is_on_sale)
        .bind(input.images)
        .fetch_one(&mut *tx)
        .await
        .map_err(product_conflict)?;

        tx.commit().await?;
        row.try_into()
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput<'_>,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ensure_sku_free(&mut tx, input.sku, Some(id), None).await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.products AS p
            SET name = $2, slug = $3, sku = $4, description = $5, price = $6,
                compare_at_price = $7, sale_price = $8, sale_starts_at = $9, sale_ends_at = $10,
                stock = $11, category_id = $12, is_active = $13, is_featured = $14,
                is_on_sale = $15, images = $16, updated_at = NOW()
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name)
        .bind(input.slug.as_str())
        .bind(input.sku.as_str())
        .bind(input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.sale_price)
        .bind(input.sale_starts_at)
        .bind(input.sale_ends_at)
        .bind(input.stock)
        .bind(input.category_id)
        .bind(input.is_active)
        .bind(input.is_featured)
        .bind(input.is_on_sale)
        .bind(input.images)
        .fetch_optional(&mut *tx)
        .await
        .map_err(product_conflict)?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        row.try_into()
    }

    /// Mark a product inactive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn soft_delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.products SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Apply `action` to every product in `ids`. Returns the number changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn bulk_update(
        &self,
        ids: &[ProductId],
        action: BulkAction,
    ) -> Result<u64, RepositoryError> {
        let raw_ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

        let sql = match action {
            BulkAction::Activate => {
                "UPDATE shop.products SET is_active = TRUE, updated_at = NOW() WHERE id = ANY($1)"
            }
            BulkAction::Deactivate | BulkAction::Delete => {
                "UPDATE shop.products SET is_active = FALSE, updated_at = NOW() WHERE id = ANY($1)"
            }
            BulkAction::Feature => {
                "UPDATE shop.products SET is_featured = TRUE, updated_at = NOW() WHERE id = ANY($1)"
            }
            BulkAction::Unfeature => {
                "UPDATE shop.products SET is_featured = FALSE, updated_at = NOW() WHERE id = ANY($1)"
            }
            BulkAction::SetCategory(_) => {
                "UPDATE shop.products SET category_id = $2, updated_at = NOW() WHERE id = ANY($1)"
            }
        };

        let mut query = sqlx::query(sql).bind(raw_ids);
        if let BulkAction::SetCategory(category_id) = action {
            query = query.bind(category_id);
        }

        let result = query.execute(self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Active products with stock at or below `threshold`, lowest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<LowStockProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, LowStockProduct>(
            r"
            SELECT id, name, sku, stock FROM shop.products
            WHERE is_active AND stock <= $1
            ORDER BY stock, name
            ",
        )
        .bind(threshold)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Variants
    // =========================================================================

    /// List a product's variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variants(
        &self,
        product_id: ProductId,
        active_only: bool,
    ) -> Result<Vec<Variant>, RepositoryError> {
        let rows = sqlx::query_as::<_, VariantRow>(&format!(
            r"
            SELECT {VARIANT_COLUMNS} FROM shop.variants
            WHERE product_id = $1 AND ($2 = FALSE OR is_active)
            ORDER BY id
            "
        ))
        .bind(product_id)
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a variant belonging to `product_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variant(
        &self,
        product_id: ProductId,
        id: VariantId,
    ) -> Result<Option<Variant>, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM shop.variants WHERE id = $1 AND product_id = $2"
        ))
        .bind(id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU is taken by any product
    /// or variant.
    pub async fn create_variant(
        &self,
        product_id: ProductId,
        input: &VariantInput<'_>,
    ) -> Result<Variant, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ensure_sku_free(&mut tx, input.sku, None, None).await?;

        let row = sqlx::query_as::<_, VariantRow>(&format!(
            r"
            INSERT INTO shop.variants (product_id, name, sku, price, stock, attributes, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {VARIANT_COLUMNS}
            "
        ))
        .bind(product_id)
        .bind(input.name)
        .bind(input.sku.as_str())
        .bind(input.price)
        .bind(input.stock)
        .bind(input.attributes)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(product_conflict)?;

        tx.commit().await?;
        row.try_into()
    }

    /// Replace a variant's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update_variant(
        &self,
        product_id: ProductId,
        id: VariantId,
        input: &VariantInput<'_>,
    ) -> Result<Variant, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ensure_sku_free(&mut tx, input.sku, None, Some(id)).await?;

        let row = sqlx::query_as::<_, VariantRow>(&format!(
            r"
            UPDATE shop.variants
            SET name = $3, sku = $4, price = $5, stock = $6, attributes = $7, is_active = $8,
                updated_at = NOW()
            WHERE id = $1 AND product_id = $2
            RETURNING {VARIANT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(product_id)
        .bind(input.name)
        .bind(input.sku.as_str())
        .bind(input.price)
        .bind(input.stock)
        .bind(input.attributes)
        .bind(input.is_active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(product_conflict)?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        row.try_into()
    }

    /// Deactivate a variant. Variants referenced by past orders are kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    pub async fn delete_variant(
        &self,
        product_id: ProductId,
        id: VariantId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.variants SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1 AND product_id = $2
            ",
        )
        .bind(id)
        .bind(product_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_deserializes_from_query_values() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap();
        assert_eq!(sort, ProductSort::PriceDesc);
        assert!(ProductSort::PriceAsc.order_by().contains("ASC"));
    }
}
