use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::{NewUser, User};

/// User account storage.
///
/// Emails are stored and looked up in normalized form
/// (see [`normalize_email`](crate::types::normalize_email)).
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds a user by normalized email.
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Finds a user by id.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;

    /// Creates a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Conflict` if the email is already taken.
    async fn create(&self, user: NewUser) -> AuthResult<User>;

    /// Replaces the stored password hash.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the user does not exist or the
    /// write fails.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> AuthResult<()>;
}
