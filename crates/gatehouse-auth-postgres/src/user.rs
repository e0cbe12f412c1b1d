//! User storage.

use gatehouse_auth::types::{NewUser, User};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{PgPool, StorageError, StorageResult};

type UserTuple = (Uuid, Uuid, String, String, String, String, bool, OffsetDateTime);

fn user_from_tuple(row: UserTuple) -> User {
    User {
        id: row.0,
        tenant_id: row.1,
        email: row.2,
        name: row.3,
        password_hash: row.4,
        role: row.5,
        is_demo: row.6,
        created_at: row.7,
    }
}

/// User storage operations over the `users` table.
pub struct UserStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> UserStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by normalized email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let row: Option<UserTuple> = query_as(
            r#"
            SELECT id, tenant_id, email, name, password_hash, role, is_demo, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(user_from_tuple))
    }

    /// Find a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<User>> {
        let row: Option<UserTuple> = query_as(
            r#"
            SELECT id, tenant_id, email, name, password_hash, role, is_demo, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(user_from_tuple))
    }

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the email is taken.
    pub async fn create(&self, new_user: NewUser) -> StorageResult<User> {
        let user = new_user.into_user();
        let row: UserTuple = query_as(
            r#"
            INSERT INTO users (id, tenant_id, email, name, password_hash, role, is_demo, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, tenant_id, email, name, password_hash, role, is_demo, created_at
            "#,
        )
        .bind(user.id)
        .bind(user.tenant_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.is_demo)
        .bind(user.created_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| StorageError::from_insert(e, || "Email already registered".to_string()))?;

        Ok(user_from_tuple(row))
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no row was updated.
    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> StorageResult<()> {
        let result = query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("User {id}")));
        }
        Ok(())
    }
}
