//! Password hashing.
//!
//! The auth core treats hashing as a black box behind [`PasswordHasher`].
//! The default implementation is Argon2id with PHC string output, run on the
//! blocking thread pool.
//!
//! # Example
//!
//! ```
//! # tokio_test::block_on(async {
//! use gatehouse_auth::password::{Argon2PasswordHasher, PasswordHasher};
//!
//! let hasher = Argon2PasswordHasher::default();
//! let hash = hasher.hash("correct horse").await.unwrap();
//! assert!(hash.starts_with("$argon2id$"));
//! assert!(hasher.verify("correct horse", &hash).await.unwrap());
//! # });
//! ```

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;

use crate::AuthResult;
use crate::error::AuthError;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hashes and verifies passwords.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Produces a self-describing digest for storage.
    async fn hash(&self, password: &str) -> AuthResult<String>;

    /// Returns `Ok(false)` on mismatch. Errors only for unusable digests.
    async fn verify(&self, password: &str, digest: &str) -> AuthResult<bool>;
}

/// Checks the password strength rule shared by registration and resets.
///
/// # Errors
///
/// Returns `AuthError::Validation` if the password is too short.
pub fn validate_new_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Argon2id hasher.
#[derive(Debug, Clone)]
pub struct Argon2PasswordHasher {
    params: Params,
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Argon2PasswordHasher {
    /// Creates a hasher with explicit cost parameters.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the parameters are out of range.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> AuthResult<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| AuthError::internal(format!("invalid argon2 params: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

#[async_trait]
impl PasswordHasher for Argon2PasswordHasher {
    async fn hash(&self, password: &str) -> AuthResult<String> {
        let argon2 = self.argon2();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AuthError::internal(format!("password hashing failed: {e}")))
        })
        .await
        .map_err(|e| AuthError::internal(format!("hashing task failed: {e}")))?
    }

    async fn verify(&self, password: &str, digest: &str) -> AuthResult<bool> {
        let argon2 = self.argon2();
        let password = password.to_owned();
        let digest = digest.to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&digest)
                .map_err(|e| AuthError::internal(format!("stored password hash is invalid: {e}")))?;
            Ok(argon2.verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await
        .map_err(|e| AuthError::internal(format!("verification task failed: {e}")))?
    }
}

#[cfg(test)]
pub(crate) fn fast_hasher() -> Argon2PasswordHasher {
    Argon2PasswordHasher::with_params(1024, 1, 1).unwrap()
}
