//! Refresh token domain type.
//!
//! # Security
//!
//! - Refresh tokens are stored as SHA-256 hashes, never plaintext
//! - Tokens can be revoked individually or for a whole user
//! - Expired tokens are cleaned up periodically

use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use super::hash_token;

/// Refresh token record.
///
/// The raw token only ever lives in the client's cookie. Lookup works by
/// hashing the presented value and searching for `token_hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    /// SHA-256 hash of the raw token. Unique lookup key.
    pub token_hash: String,

    pub user_id: Uuid,

    pub expires_at: OffsetDateTime,

    /// Client IP at creation.
    pub created_ip: Option<String>,

    /// Client user agent at creation.
    pub created_user_agent: Option<String>,

    pub created_at: OffsetDateTime,
}

impl RefreshToken {
    /// Creates a record for `raw_token` expiring `ttl` from now.
    #[must_use]
    pub fn new(
        raw_token: &str,
        user_id: Uuid,
        ttl: Duration,
        created_ip: Option<String>,
        created_user_agent: Option<String>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            token_hash: hash_token(raw_token),
            user_id,
            expires_at: now + ttl,
            created_ip,
            created_user_agent,
            created_at: now,
        }
    }

    /// Returns `true` if this token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at < now
    }

    /// Returns `true` if this token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }
}
