//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{Email, UserId, UserRole};

use super::{Page, RepositoryError, conflict_on_unique};
use crate::models::User;

const USER_COLUMNS: &str = "id, name, email, role, is_active, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    role: UserRole,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            email,
            role: row.role,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user accounts.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.users WHERE LOWER(email) = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user together with their password hash, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM shop.users WHERE LOWER(email) = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok::<_, RepositoryError>((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    /// Get the password hash for a user ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn password_hash_by_id(&self, id: UserId) -> Result<String, RepositoryError> {
        sqlx::query_scalar::<_, String>("SELECT password_hash FROM shop.users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
        role: UserRole,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO shop.users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(name)
        .bind(email.as_str())
        .bind(password_hash)
        .bind(role)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("email already exists"))?;

        row.try_into()
    }

    /// Update name and email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email belongs to another user.
    pub async fn update_profile(
        &self,
        id: UserId,
        name: &str,
        email: &Email,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE shop.users SET name = $2, email = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(name)
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("email already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Replace the password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Change role and/or active flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_access(
        &self,
        id: UserId,
        role: Option<UserRole>,
        is_active: Option<bool>,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE shop.users
            SET role = COALESCE($2, role),
                is_active = COALESCE($3, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(role)
        .bind(is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Set a user's role by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has that email.
    pub async fn set_role_by_email(
        &self,
        email: &Email,
        role: UserRole,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE shop.users SET role = $2, updated_at = NOW()
            WHERE LOWER(email) = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(email.as_str())
        .bind(role)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// List shopper accounts, newest first, optionally filtered by name or email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_customers(
        &self,
        search: Option<&str>,
        page: Page,
    ) -> Result<(Vec<User>, i64), RepositoryError> {
        let pattern = search.map(|s| format!("%{}%", s.trim()));

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r"
            SELECT {USER_COLUMNS} FROM shop.users
            WHERE role = 'user'
              AND ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(pattern.as_deref())
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM shop.users
            WHERE role = 'user'
              AND ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)
            ",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let users = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }

    /// Order count and lifetime spend for a customer (cancelled excluded).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customer_stats(
        &self,
        id: UserId,
    ) -> Result<(i64, rust_decimal::Decimal), RepositoryError> {
        let stats = sqlx::query_as::<_, (i64, rust_decimal::Decimal)>(
            r"
            SELECT COUNT(*), COALESCE(SUM(total), 0)
            FROM shop.orders
            WHERE user_id = $1 AND status <> 'cancelled'
            ",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(stats)
    }
}
