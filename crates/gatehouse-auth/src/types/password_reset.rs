use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use super::hash_token;

/// Password reset token record. Only the hash is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub created_ip: Option<String>,
    pub created_user_agent: Option<String>,
}

impl PasswordResetToken {
    #[must_use]
    pub fn new(
        raw_token: &str,
        user_id: Uuid,
        ttl: Duration,
        created_ip: Option<String>,
        created_user_agent: Option<String>,
    ) -> Self {
        Self {
            token_hash: hash_token(raw_token),
            user_id,
            expires_at: OffsetDateTime::now_utc() + ttl,
            created_ip,
            created_user_agent,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at < now
    }
}
