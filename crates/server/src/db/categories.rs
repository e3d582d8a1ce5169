//! Category repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{CategoryId, Slug};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Category;

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, parent_id, is_active, sort_order, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    slug: String,
    description: Option<String>,
    parent_id: Option<i32>,
    is_active: bool,
    sort_order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = RepositoryError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid category slug in database: {e}"))
        })?;

        Ok(Self {
            id: CategoryId::new(row.id),
            name: row.name,
            slug,
            description: row.description,
            parent_id: row.parent_id.map(CategoryId::new),
            is_active: row.is_active,
            sort_order: row.sort_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Category fields supplied on create and update.
#[derive(Debug, Clone)]
pub struct CategoryInput<'a> {
    pub name: &'a str,
    pub slug: &'a Slug,
    pub description: Option<&'a str>,
    pub parent_id: Option<CategoryId>,
    pub sort_order: i32,
    pub is_active: bool,
}

/// Repository for catalog categories.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List categories by sort order, optionally only active ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, active_only: bool) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            SELECT {CATEGORY_COLUMNS} FROM shop.categories
            WHERE ($1 = FALSE OR is_active)
            ORDER BY sort_order, name
            "
        ))
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM shop.categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &CategoryInput<'_>) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            INSERT INTO shop.categories (name, slug, description, parent_id, sort_order, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(input.name)
        .bind(input.slug.as_str())
        .bind(input.description)
        .bind(input.parent_id)
        .bind(input.sort_order)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("category slug already exists"))?;

        row.try_into()
    }

    /// Replace a category's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput<'_>,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            UPDATE shop.categories
            SET name = $2, slug = $3, description = $4, parent_id = $5, sort_order = $6,
                is_active = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name)
        .bind(input.slug.as_str())
        .bind(input.description)
        .bind(input.parent_id)
        .bind(input.sort_order)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("category slug already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Whether `ancestor` appears on the parent chain of `id` (or is `id`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_descendant_or_self(
        &self,
        id: CategoryId,
        ancestor: CategoryId,
    ) -> Result<bool, RepositoryError> {
        let found = sqlx::query_scalar::<_, bool>(
            r"
            WITH RECURSIVE chain AS (
                SELECT id, parent_id FROM shop.categories WHERE id = $1
                UNION ALL
                SELECT c.id, c.parent_id FROM shop.categories c
                JOIN chain ON c.id = chain.parent_id
            )
            SELECT EXISTS (SELECT 1 FROM chain WHERE id = $2)
            ",
        )
        .bind(id)
        .bind(ancestor)
        .fetch_one(self.pool)
        .await?;

        Ok(found)
    }

    /// Delete a category.
    ///
    /// A soft delete marks the category inactive and is rejected while any
    /// product references it. A hard delete removes the row and is rejected
    /// while it has subcategories or products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` when a rule blocks the delete and
    /// `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete(&self, id: CategoryId, hard: bool) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM shop.categories WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let products = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shop.products WHERE category_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if hard {
            let children = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM shop.categories WHERE parent_id = $1",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if children > 0 {
                return Err(RepositoryError::Conflict(format!(
                    "category has {children} subcategories"
                )));
            }
            if products > 0 {
                return Err(RepositoryError::Conflict(format!(
                    "category is used by {products} products"
                )));
            }
            sqlx::query("DELETE FROM shop.categories WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        } else {
            if products > 0 {
                return Err(RepositoryError::Conflict(format!(
                    "category is used by {products} products"
                )));
            }
            sqlx::query(
                "UPDATE shop.categories SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
