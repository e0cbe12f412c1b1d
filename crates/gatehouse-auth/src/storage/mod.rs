//! Storage traits for users and persisted tokens.
//!
//! # Implementations
//!
//! - [`InMemoryAuthStorage`] in this crate, for tests and single-node setups
//! - `gatehouse-auth-postgres` for PostgreSQL

pub mod memory;
pub mod password_reset;
pub mod refresh_token;
pub mod user;

pub use memory::InMemoryAuthStorage;
pub use password_reset::PasswordResetStorage;
pub use refresh_token::RefreshTokenStorage;
pub use user::UserStore;

use std::future::Future;
use std::time::Duration;

use crate::AuthResult;
use crate::error::AuthError;

/// Runs one storage call under `limit`.
///
/// An elapsed timer surfaces as `AuthError::Internal`, never as success.
pub async fn bounded<T, F>(limit: Duration, operation: &'static str, call: F) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::internal(format!(
            "storage call '{operation}' timed out after {limit:?}"
        ))),
    }
}
