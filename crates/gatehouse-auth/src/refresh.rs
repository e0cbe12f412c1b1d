//! Refresh token store.
//!
//! Creates opaque refresh tokens, consumes them at refresh time, revokes one
//! or all tokens of a user and purges expired rows. Only SHA-256 hashes reach
//! storage; the raw value exists in the client's cookie and, briefly, in the
//! response that sets it.
//!
//! With rotation on (the default) a token is consumed by an atomic
//! delete-and-return, so replaying it, even concurrently, yields `NotFound`.
//! With rotation off the row stays until it expires (sliding session).

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::device::ClientContext;
use crate::error::AuthError;
use crate::storage::{RefreshTokenStorage, UserStore, bounded};
use crate::types::{RefreshToken, SessionUser, User, UserProfile, generate_token, hash_token};

/// Why a refresh token was not accepted.
#[derive(Debug, thiserror::Error)]
pub enum RefreshTokenError {
    /// No live record for this token.
    #[error("Refresh token not found")]
    NotFound,

    /// The record existed but had expired. It has been deleted.
    #[error("Refresh token expired")]
    Expired,

    /// Storage failed or timed out.
    #[error(transparent)]
    Storage(#[from] AuthError),
}

/// Identity resolved from a consumed refresh token.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub user: SessionUser,
    pub profile: UserProfile,
}

impl From<&User> for SessionInfo {
    fn from(user: &User) -> Self {
        Self {
            user: SessionUser::from(user),
            profile: UserProfile::from(user),
        }
    }
}

/// Refresh token lifecycle over a storage collaborator.
pub struct RefreshTokenStore {
    storage: Arc<dyn RefreshTokenStorage>,
    users: Arc<dyn UserStore>,
    ttl: Duration,
    rotation: bool,
    storage_timeout: Duration,
}

impl RefreshTokenStore {
    #[must_use]
    pub fn new(
        storage: Arc<dyn RefreshTokenStorage>,
        users: Arc<dyn UserStore>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            storage,
            users,
            ttl: config.tokens.refresh_token_lifetime(),
            rotation: config.tokens.refresh_token_rotation,
            storage_timeout: config.storage_timeout,
        }
    }

    /// Returns `true` if tokens are deleted on use.
    #[must_use]
    pub fn rotation_enabled(&self) -> bool {
        self.rotation
    }

    /// Creates a refresh token for `user_id` and returns the raw value.
    pub async fn create(&self, user_id: Uuid, client: &ClientContext) -> AuthResult<String> {
        let raw = generate_token();
        let record = RefreshToken::new(
            &raw,
            user_id,
            self.ttl,
            client.ip.clone(),
            client.user_agent.clone(),
        );
        bounded(
            self.storage_timeout,
            "refresh_tokens.create",
            self.storage.create(&record),
        )
        .await?;
        Ok(raw)
    }

    /// Verifies a raw refresh token and, with rotation on, consumes it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no record matches, or its user no longer exists
    /// - `Expired` if the record is past `expires_at` (the row is deleted)
    /// - `Storage` on storage failure or timeout
    pub async fn verify_and_consume(&self, raw: &str) -> Result<SessionInfo, RefreshTokenError> {
        let hash = hash_token(raw);
        let now = OffsetDateTime::now_utc();

        let record = if self.rotation {
            bounded(
                self.storage_timeout,
                "refresh_tokens.take_by_hash",
                self.storage.take_by_hash(&hash),
            )
            .await?
            .ok_or(RefreshTokenError::NotFound)?
        } else {
            let record = bounded(
                self.storage_timeout,
                "refresh_tokens.find_by_hash",
                self.storage.find_by_hash(&hash),
            )
            .await?
            .ok_or(RefreshTokenError::NotFound)?;
            if record.is_expired_at(now) {
                bounded(
                    self.storage_timeout,
                    "refresh_tokens.delete_by_hash",
                    self.storage.delete_by_hash(&hash),
                )
                .await?;
            }
            record
        };

        if record.is_expired_at(now) {
            return Err(RefreshTokenError::Expired);
        }

        let user = bounded(
            self.storage_timeout,
            "users.find_by_id",
            self.users.find_by_id(record.user_id),
        )
        .await?
        .ok_or(RefreshTokenError::NotFound)?;

        Ok(SessionInfo::from(&user))
    }

    /// Deletes the record for a raw token. Idempotent.
    pub async fn revoke_one(&self, raw: &str) -> AuthResult<()> {
        bounded(
            self.storage_timeout,
            "refresh_tokens.delete_by_hash",
            self.storage.delete_by_hash(&hash_token(raw)),
        )
        .await
    }

    /// Deletes every record of a user. Idempotent; returns the count.
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        bounded(
            self.storage_timeout,
            "refresh_tokens.delete_by_user",
            self.storage.delete_by_user(user_id),
        )
        .await
    }

    /// Deletes every expired record; returns the count.
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        bounded(
            self.storage_timeout,
            "refresh_tokens.delete_expired",
            self.storage.delete_expired(OffsetDateTime::now_utc()),
        )
        .await
    }
}
