//! Password reset token storage.

use gatehouse_auth::types::PasswordResetToken;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{PgPool, StorageError, StorageResult};

type ResetTuple = (String, Uuid, OffsetDateTime, Option<String>, Option<String>);

/// Password reset token storage over the `password_reset_tokens` table.
pub struct PasswordResetStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> PasswordResetStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a token record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a duplicate hash.
    pub async fn create(&self, token: &PasswordResetToken) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO password_reset_tokens
                (token_hash, user_id, expires_at, created_ip, created_user_agent)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&token.token_hash)
        .bind(token.user_id)
        .bind(token.expires_at)
        .bind(&token.created_ip)
        .bind(&token.created_user_agent)
        .execute(self.pool)
        .await
        .map_err(|e| StorageError::from_insert(e, || "Reset token already exists".to_string()))?;

        Ok(())
    }

    /// Delete a token and return it in one statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn take_by_hash(&self, token_hash: &str) -> StorageResult<Option<PasswordResetToken>> {
        let row: Option<ResetTuple> = query_as(
            r#"
            DELETE FROM password_reset_tokens
            WHERE token_hash = $1
            RETURNING token_hash, user_id, expires_at, created_ip, created_user_agent
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| PasswordResetToken {
            token_hash: r.0,
            user_id: r.1,
            expires_at: r.2,
            created_ip: r.3,
            created_user_agent: r.4,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_by_user(&self, user_id: Uuid) -> StorageResult<u64> {
        let result = query("DELETE FROM password_reset_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_expired(&self, now: OffsetDateTime) -> StorageResult<u64> {
        let result = query("DELETE FROM password_reset_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
