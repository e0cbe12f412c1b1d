use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::PasswordResetToken;

/// Storage trait for password reset tokens. Only hashes are stored.
#[async_trait]
pub trait PasswordResetStorage: Send + Sync {
    /// Stores a new reset token.
    async fn create(&self, token: &PasswordResetToken) -> AuthResult<()>;

    /// Atomically deletes and returns the token with this hash.
    async fn take_by_hash(&self, token_hash: &str) -> AuthResult<Option<PasswordResetToken>>;

    /// Deletes every reset token for a user. Returns the number deleted.
    async fn delete_by_user(&self, user_id: Uuid) -> AuthResult<u64>;

    /// Deletes every token with `expires_at < now`. Returns the number deleted.
    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
