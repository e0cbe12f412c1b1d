//! Refresh token storage trait.
//!
//! # Security Considerations
//!
//! - Tokens are stored as SHA-256 hashes only
//! - Consumption must be a single atomic delete-and-return
//! - Expired tokens should be cleaned up periodically

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::RefreshToken;

/// Storage trait for refresh tokens.
///
/// # Implementations
///
/// - [`InMemoryAuthStorage`](crate::storage::InMemoryAuthStorage)
/// - `gatehouse-auth-postgres` - PostgreSQL storage backend
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Stores a new refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be stored (e.g., duplicate hash,
    /// storage unavailable).
    async fn create(&self, token: &RefreshToken) -> AuthResult<()>;

    /// Finds a refresh token by its hash without consuming it.
    ///
    /// Returns tokens regardless of expiration; callers check expiry.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>>;

    /// Atomically deletes and returns the token with this hash.
    ///
    /// Of two concurrent calls with the same hash, at most one receives
    /// `Some`. Implementations must not split this into a read followed by a
    /// delete.
    async fn take_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>>;

    /// Deletes the token with this hash. No-op if absent.
    async fn delete_by_hash(&self, token_hash: &str) -> AuthResult<()>;

    /// Deletes every token belonging to a user. Returns the number deleted.
    async fn delete_by_user(&self, user_id: Uuid) -> AuthResult<u64>;

    /// Deletes every token with `expires_at < now`. Returns the number deleted.
    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
