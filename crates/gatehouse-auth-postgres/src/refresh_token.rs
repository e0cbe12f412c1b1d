//! Refresh token storage.
//!
//! Rows are keyed by the SHA-256 hash of the raw token; the raw value never
//! reaches the database.

use gatehouse_auth::types::RefreshToken;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{PgPool, StorageError, StorageResult};

type TokenTuple = (
    String,
    Uuid,
    OffsetDateTime,
    Option<String>,
    Option<String>,
    OffsetDateTime,
);

fn token_from_tuple(row: TokenTuple) -> RefreshToken {
    RefreshToken {
        token_hash: row.0,
        user_id: row.1,
        expires_at: row.2,
        created_ip: row.3,
        created_user_agent: row.4,
        created_at: row.5,
    }
}

/// Refresh token storage operations over the `refresh_tokens` table.
pub struct RefreshTokenStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> RefreshTokenStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a token record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a duplicate hash.
    pub async fn create(&self, token: &RefreshToken) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO refresh_tokens
                (token_hash, user_id, expires_at, created_ip, created_user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&token.token_hash)
        .bind(token.user_id)
        .bind(token.expires_at)
        .bind(&token.created_ip)
        .bind(&token.created_user_agent)
        .bind(token.created_at)
        .execute(self.pool)
        .await
        .map_err(|e| StorageError::from_insert(e, || "Refresh token already exists".to_string()))?;

        Ok(())
    }

    /// Find a token by hash without consuming it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_hash(&self, token_hash: &str) -> StorageResult<Option<RefreshToken>> {
        let row: Option<TokenTuple> = query_as(
            r#"
            SELECT token_hash, user_id, expires_at, created_ip, created_user_agent, created_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(token_from_tuple))
    }

    /// Delete a token and return it in one statement.
    ///
    /// Of two concurrent callers with the same hash, only one gets the row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn take_by_hash(&self, token_hash: &str) -> StorageResult<Option<RefreshToken>> {
        let row: Option<TokenTuple> = query_as(
            r#"
            DELETE FROM refresh_tokens
            WHERE token_hash = $1
            RETURNING token_hash, user_id, expires_at, created_ip, created_user_agent, created_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(token_from_tuple))
    }

    /// Delete a token by hash. Missing rows are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_by_hash(&self, token_hash: &str) -> StorageResult<()> {
        query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete every token of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_by_user(&self, user_id: Uuid) -> StorageResult<u64> {
        let result = query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every token with `expires_at < now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_expired(&self, now: OffsetDateTime) -> StorageResult<u64> {
        let result = query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
