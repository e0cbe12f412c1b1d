//! `gatehouse-auth` storage trait implementations.
//!
//! [`PostgresAuthStorage`] owns an `Arc<PgPool>`, so it can be handed to the
//! auth core as `Arc<dyn UserStore>` and friends. Each call borrows a
//! short-lived table accessor.

use async_trait::async_trait;
use gatehouse_auth::AuthResult;
use gatehouse_auth::storage::{
    PasswordResetStorage as PasswordResetStorageTrait,
    RefreshTokenStorage as RefreshTokenStorageTrait, UserStore,
};
use gatehouse_auth::types::{NewUser, PasswordResetToken, RefreshToken, User};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::PostgresAuthStorage;

#[async_trait]
impl UserStore for PostgresAuthStorage {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        Ok(self.users().find_by_email(email).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        Ok(self.users().find_by_id(id).await?)
    }

    async fn create(&self, user: NewUser) -> AuthResult<User> {
        Ok(self.users().create(user).await?)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AuthResult<()> {
        Ok(self.users().update_password(id, password_hash).await?)
    }
}

#[async_trait]
impl RefreshTokenStorageTrait for PostgresAuthStorage {
    async fn create(&self, token: &RefreshToken) -> AuthResult<()> {
        Ok(self.refresh_tokens().create(token).await?)
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self.refresh_tokens().find_by_hash(token_hash).await?)
    }

    async fn take_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self.refresh_tokens().take_by_hash(token_hash).await?)
    }

    async fn delete_by_hash(&self, token_hash: &str) -> AuthResult<()> {
        Ok(self.refresh_tokens().delete_by_hash(token_hash).await?)
    }

    async fn delete_by_user(&self, user_id: Uuid) -> AuthResult<u64> {
        Ok(self.refresh_tokens().delete_by_user(user_id).await?)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        Ok(self.refresh_tokens().delete_expired(now).await?)
    }
}

#[async_trait]
impl PasswordResetStorageTrait for PostgresAuthStorage {
    async fn create(&self, token: &PasswordResetToken) -> AuthResult<()> {
        Ok(self.password_resets().create(token).await?)
    }

    async fn take_by_hash(&self, token_hash: &str) -> AuthResult<Option<PasswordResetToken>> {
        Ok(self.password_resets().take_by_hash(token_hash).await?)
    }

    async fn delete_by_user(&self, user_id: Uuid) -> AuthResult<u64> {
        Ok(self.password_resets().delete_by_user(user_id).await?)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        Ok(self.password_resets().delete_expired(now).await?)
    }
}
