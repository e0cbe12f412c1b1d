//! Password reset tokens.
//!
//! The raw token goes out exactly once, inside the reset link. Storage holds
//! only its hash. Consumption is an atomic take, so a token works once.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::device::ClientContext;
use crate::error::AuthError;
use crate::storage::{PasswordResetStorage, bounded};
use crate::types::{PasswordResetToken, generate_token, hash_token};

/// Why a reset token was not accepted.
#[derive(Debug, thiserror::Error)]
pub enum PasswordResetError {
    #[error("Reset token not found")]
    NotFound,

    #[error("Reset token expired")]
    Expired,

    #[error(transparent)]
    Storage(#[from] AuthError),
}

/// Issues and consumes password reset tokens.
pub struct PasswordResetService {
    storage: Arc<dyn PasswordResetStorage>,
    ttl: Duration,
    link_base_url: String,
    storage_timeout: Duration,
}

impl PasswordResetService {
    #[must_use]
    pub fn new(storage: Arc<dyn PasswordResetStorage>, config: &AuthConfig) -> Self {
        Self {
            storage,
            ttl: config.tokens.password_reset_lifetime(),
            link_base_url: config.password_reset.link_base_url.clone(),
            storage_timeout: config.storage_timeout,
        }
    }

    /// Stores a new token for `user_id` and returns the raw value.
    pub async fn issue(&self, user_id: Uuid, client: &ClientContext) -> AuthResult<String> {
        let raw = generate_token();
        let record = PasswordResetToken::new(
            &raw,
            user_id,
            self.ttl,
            client.ip.clone(),
            client.user_agent.clone(),
        );
        bounded(
            self.storage_timeout,
            "password_reset_tokens.create",
            self.storage.create(&record),
        )
        .await?;
        Ok(raw)
    }

    /// Builds the link mailed to the user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the configured base URL does not parse.
    pub fn reset_link(&self, raw: &str) -> AuthResult<String> {
        let mut url = url::Url::parse(&self.link_base_url)
            .map_err(|e| AuthError::internal(format!("invalid reset link base URL: {e}")))?;
        url.query_pairs_mut().append_pair("token", raw);
        Ok(url.into())
    }

    /// Consumes a raw token and returns the user it was issued to.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown or already used tokens, `Expired` for stale ones.
    pub async fn consume(&self, raw: &str) -> Result<Uuid, PasswordResetError> {
        let record = bounded(
            self.storage_timeout,
            "password_reset_tokens.take_by_hash",
            self.storage.take_by_hash(&hash_token(raw)),
        )
        .await?
        .ok_or(PasswordResetError::NotFound)?;

        if record.is_expired_at(OffsetDateTime::now_utc()) {
            return Err(PasswordResetError::Expired);
        }
        Ok(record.user_id)
    }

    /// Deletes every outstanding token for a user.
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        bounded(
            self.storage_timeout,
            "password_reset_tokens.delete_by_user",
            self.storage.delete_by_user(user_id),
        )
        .await
    }

    /// Deletes every expired token; returns the count.
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        bounded(
            self.storage_timeout,
            "password_reset_tokens.delete_expired",
            self.storage.delete_expired(OffsetDateTime::now_utc()),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::storage::InMemoryAuthStorage;

    fn service() -> (PasswordResetService, Arc<InMemoryAuthStorage>) {
        let storage = Arc::new(InMemoryAuthStorage::new());
        (PasswordResetService::new(storage.clone(), &test_config()), storage)
    }

    #[tokio::test]
    async fn test_token_is_single_use() {
        let (service, _) = service();
        let user = Uuid::new_v4();
        let raw = service.issue(user, &ClientContext::default()).await.unwrap();

        assert_eq!(service.consume(&raw).await.unwrap(), user);
        assert!(matches!(
            service.consume(&raw).await,
            Err(PasswordResetError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let (service, storage) = service();
        let record = PasswordResetToken {
            expires_at: OffsetDateTime::now_utc() - time::Duration::seconds(1),
            ..PasswordResetToken::new("stale", Uuid::new_v4(), Duration::from_secs(1), None, None)
        };
        PasswordResetStorage::create(storage.as_ref(), &record).await.unwrap();

        assert!(matches!(
            service.consume("stale").await,
            Err(PasswordResetError::Expired)
        ));
        assert_eq!(storage.reset_token_count(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (service, storage) = service();
        let record = PasswordResetToken {
            expires_at: OffsetDateTime::now_utc() - time::Duration::seconds(1),
            ..PasswordResetToken::new("stale", Uuid::new_v4(), Duration::from_secs(1), None, None)
        };
        PasswordResetStorage::create(storage.as_ref(), &record).await.unwrap();
        service.issue(Uuid::new_v4(), &ClientContext::default()).await.unwrap();

        assert_eq!(service.purge_expired().await.unwrap(), 1);
        assert_eq!(storage.reset_token_count(), 1);
    }

    #[test]
    fn test_reset_link_encodes_token() {
        let (service, _) = service();
        let link = service.reset_link("a+b/c").unwrap();
        assert_eq!(link, "http://localhost:3000/reset-password?token=a%2Bb%2Fc");
    }
}
