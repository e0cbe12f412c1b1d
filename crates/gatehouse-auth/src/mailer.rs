//! Outbound mail for password reset links.

use async_trait::async_trait;

use crate::AuthResult;

/// Delivers password reset links.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, email: &str, link: &str) -> AuthResult<()>;
}

/// Mailer used when no delivery is configured. Drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send_password_reset(&self, _email: &str, _link: &str) -> AuthResult<()> {
        tracing::warn!("mail delivery is not configured; password reset link not sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_mailer_accepts_everything() {
        assert!(
            DisabledMailer
                .send_password_reset("a@b.com", "http://x/?token=t")
                .await
                .is_ok()
        );
    }
}
