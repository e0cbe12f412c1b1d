//! In-memory storage backend.
//!
//! Every map is a `DashMap`. `take_by_hash` is `DashMap::remove`, which holds
//! the shard lock for the lookup and the delete, so concurrent consumers of the
//! same token cannot both succeed.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{PasswordResetStorage, RefreshTokenStorage, UserStore};
use crate::error::AuthError;
use crate::types::{NewUser, PasswordResetToken, RefreshToken, User};
use crate::AuthResult;

/// Users, refresh tokens and reset tokens held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryAuthStorage {
    users: DashMap<Uuid, User>,
    emails: DashMap<String, Uuid>,
    refresh_tokens: DashMap<String, RefreshToken>,
    reset_tokens: DashMap<String, PasswordResetToken>,
}

impl InMemoryAuthStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored refresh tokens.
    #[must_use]
    pub fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.len()
    }

    /// Number of stored reset tokens.
    #[must_use]
    pub fn reset_token_count(&self) -> usize {
        self.reset_tokens.len()
    }
}

fn retain_counting<V>(map: &DashMap<String, V>, mut keep: impl FnMut(&V) -> bool) -> u64 {
    let before = map.len();
    map.retain(|_, v| keep(v));
    before.saturating_sub(map.len()) as u64
}

#[async_trait]
impl UserStore for InMemoryAuthStorage {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let Some(id) = self.emails.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn create(&self, user: NewUser) -> AuthResult<User> {
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(AuthError::conflict("Email already registered")),
            Entry::Vacant(slot) => {
                let user = user.into_user();
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AuthResult<()> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AuthError::internal(format!("user {id} not found")))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStorage for InMemoryAuthStorage {
    async fn create(&self, token: &RefreshToken) -> AuthResult<()> {
        match self.refresh_tokens.entry(token.token_hash.clone()) {
            Entry::Occupied(_) => Err(AuthError::internal("duplicate refresh token hash")),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(())
            }
        }
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self.refresh_tokens.get(token_hash).map(|t| t.clone()))
    }

    async fn take_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self.refresh_tokens.remove(token_hash).map(|(_, t)| t))
    }

    async fn delete_by_hash(&self, token_hash: &str) -> AuthResult<()> {
        self.refresh_tokens.remove(token_hash);
        Ok(())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> AuthResult<u64> {
        Ok(retain_counting(&self.refresh_tokens, |t| t.user_id != user_id))
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        Ok(retain_counting(&self.refresh_tokens, |t| !t.is_expired_at(now)))
    }
}

#[async_trait]
impl PasswordResetStorage for InMemoryAuthStorage {
    async fn create(&self, token: &PasswordResetToken) -> AuthResult<()> {
        self.reset_tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn take_by_hash(&self, token_hash: &str) -> AuthResult<Option<PasswordResetToken>> {
        Ok(self.reset_tokens.remove(token_hash).map(|(_, t)| t))
    }

    async fn delete_by_user(&self, user_id: Uuid) -> AuthResult<u64> {
        Ok(retain_counting(&self.reset_tokens, |t| t.user_id != user_id))
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        Ok(retain_counting(&self.reset_tokens, |t| !t.is_expired_at(now)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::types::hash_token;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            tenant_id: Uuid::new_v4(),
            email: email.to_string(),
            name: "Test".to_string(),
            password_hash: "hash".to_string(),
            role: "owner".to_string(),
            is_demo: false,
        }
    }

    #[tokio::test]
    async fn test_user_create_and_find() {
        let store = InMemoryAuthStorage::new();
        let user = UserStore::create(&store, new_user("a@b.com")).await.unwrap();

        let by_email = store.find_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(store.find_by_id(user.id).await.unwrap().is_some());
        assert!(store.find_by_email("x@b.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = InMemoryAuthStorage::new();
        UserStore::create(&store, new_user("a@b.com")).await.unwrap();
        let err = UserStore::create(&store, new_user("a@b.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_update_password() {
        let store = InMemoryAuthStorage::new();
        let user = UserStore::create(&store, new_user("a@b.com")).await.unwrap();
        store.update_password(user.id, "new-hash").await.unwrap();
        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.password_hash, "new-hash");

        assert!(store.update_password(Uuid::new_v4(), "x").await.is_err());
    }

    #[tokio::test]
    async fn test_take_by_hash_is_single_use() {
        let store = InMemoryAuthStorage::new();
        let token = RefreshToken::new("raw", Uuid::new_v4(), Duration::from_secs(60), None, None);
        RefreshTokenStorage::create(&store, &token).await.unwrap();

        let hash = hash_token("raw");
        assert!(RefreshTokenStorage::take_by_hash(&store, &hash).await.unwrap().is_some());
        assert!(RefreshTokenStorage::take_by_hash(&store, &hash).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_take_yields_one_winner() {
        let store = Arc::new(InMemoryAuthStorage::new());
        let token = RefreshToken::new("raw", Uuid::new_v4(), Duration::from_secs(60), None, None);
        RefreshTokenStorage::create(store.as_ref(), &token).await.unwrap();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                let hash = token.token_hash.clone();
                tokio::spawn(async move {
                    RefreshTokenStorage::take_by_hash(store.as_ref(), &hash)
                        .await
                        .unwrap()
                        .is_some()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_delete_by_user_and_expired() {
        let store = InMemoryAuthStorage::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        for (raw, user) in [("a1", alice), ("a2", alice), ("b1", bob)] {
            let token = RefreshToken::new(raw, user, Duration::from_secs(60), None, None);
            RefreshTokenStorage::create(&store, &token).await.unwrap();
        }

        assert_eq!(RefreshTokenStorage::delete_by_user(&store, alice).await.unwrap(), 2);
        assert_eq!(RefreshTokenStorage::delete_by_user(&store, alice).await.unwrap(), 0);
        assert_eq!(store.refresh_token_count(), 1);

        let later = OffsetDateTime::now_utc() + Duration::from_secs(120);
        assert_eq!(RefreshTokenStorage::delete_expired(&store, later).await.unwrap(), 1);
        assert_eq!(store.refresh_token_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_tokens() {
        let store = InMemoryAuthStorage::new();
        let user = Uuid::new_v4();
        let token = PasswordResetToken::new("reset", user, Duration::from_secs(60), None, None);
        PasswordResetStorage::create(&store, &token).await.unwrap();
        PasswordResetStorage::create(
            &store,
            &PasswordResetToken::new("reset2", user, Duration::from_secs(60), None, None),
        )
        .await
        .unwrap();

        let taken = PasswordResetStorage::take_by_hash(&store, &hash_token("reset"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(taken.user_id, user);
        assert_eq!(PasswordResetStorage::delete_by_user(&store, user).await.unwrap(), 1);
        assert_eq!(store.reset_token_count(), 0);
    }
}
