//! Domain types for users and persisted tokens.
//!
//! Opaque tokens (refresh and password reset) share one generator and one
//! hash function: the raw value is handed to the client exactly once and only
//! its SHA-256 hash is stored.

pub mod password_reset;
pub mod refresh_token;
pub mod user;

pub use password_reset::PasswordResetToken;
pub use refresh_token::RefreshToken;
pub use user::{NewUser, SessionUser, User, UserProfile, normalize_email};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Hash a token value using SHA-256 (64 hex characters).
///
/// Used both when storing new tokens and when looking them up.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a cryptographically secure random token.
///
/// Returns a 256-bit random value encoded as base64url (43 characters).
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
