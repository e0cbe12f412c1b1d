//! PostgreSQL storage backend for Gatehouse auth.
//!
//! Provides persistent storage for:
//!
//! - Users (`users`)
//! - Refresh tokens (`refresh_tokens`), keyed by token hash
//! - Password reset tokens (`password_reset_tokens`), keyed by token hash
//!
//! Token consumption is a single `DELETE ... RETURNING` statement, so two
//! concurrent requests presenting the same token cannot both succeed.
//!
//! # Example
//!
//! ```ignore
//! use gatehouse_auth_postgres::PostgresAuthStorage;
//!
//! let storage = PostgresAuthStorage::connect("postgres://localhost/gatehouse").await?;
//! storage.migrate().await?;
//!
//! let user = storage.users().find_by_email("a@b.com").await?;
//! ```

pub mod adapters;
pub mod password_reset;
pub mod refresh_token;
pub mod schema;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use gatehouse_auth::AuthError;
use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use password_reset::PasswordResetStorage;
pub use refresh_token::RefreshTokenStorage;
pub use user::UserStorage;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during auth storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Requested row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violated.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl StorageError {
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Maps a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_insert(err: sqlx_core::Error, conflict: impl FnOnce() -> String) -> Self {
        if let sqlx_core::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(conflict());
        }
        Self::Database(err)
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(message) => AuthError::conflict(message),
            other => AuthError::internal(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// PostgreSQL Auth Storage
// =============================================================================

/// Connection settings for [`PostgresAuthStorage::connect_with`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// PostgreSQL storage backend for authentication data.
///
/// Implements the `gatehouse-auth` storage traits (see [`adapters`]) and
/// exposes borrowing per-table accessors.
#[derive(Debug, Clone)]
pub struct PostgresAuthStorage {
    pool: Arc<PgPool>,
}

impl PostgresAuthStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with(database_url, &ConnectOptions::default()).await
    }

    /// Connects with explicit pool settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect_with(database_url: &str, options: &ConnectOptions) -> StorageResult<Self> {
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(database_url)
            .await?;
        tracing::info!(max_connections = options.max_connections, "connected to PostgreSQL");
        Ok(Self::new(Arc::new(pool)))
    }

    /// Creates the auth tables and indexes if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails.
    pub async fn migrate(&self) -> StorageResult<()> {
        schema::apply(&self.pool).await
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // -------------------------------------------------------------------------
    // Storage Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn users(&self) -> UserStorage<'_> {
        UserStorage::new(&self.pool)
    }

    #[must_use]
    pub fn refresh_tokens(&self) -> RefreshTokenStorage<'_> {
        RefreshTokenStorage::new(&self.pool)
    }

    #[must_use]
    pub fn password_resets(&self) -> PasswordResetStorage<'_> {
        PasswordResetStorage::new(&self.pool)
    }
}
