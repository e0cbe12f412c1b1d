use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::token::AccessTokenClaims;

/// A stored user account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Normalized (trimmed, lower-case) email. Unique.
    pub email: String,
    pub name: String,
    /// PHC-format password hash.
    pub password_hash: String,
    pub role: String,
    pub is_demo: bool,
    pub created_at: OffsetDateTime,
}

/// Input for [`UserStore::create`](crate::storage::UserStore::create).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub is_demo: bool,
}

impl NewUser {
    /// Assigns an id and creation time.
    #[must_use]
    pub fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            role: self.role,
            is_demo: self.is_demo,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Non-sensitive user fields returned in response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub is_demo: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
            is_demo: user.is_demo,
        }
    }
}

/// Identity carried by a verified access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub role: String,
    pub is_demo: bool,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            role: user.role.clone(),
            is_demo: user.is_demo,
        }
    }
}

impl From<&AccessTokenClaims> for SessionUser {
    fn from(claims: &AccessTokenClaims) -> Self {
        Self {
            id: claims.sub,
            tenant_id: claims.tenant_id,
            role: claims.role.clone(),
            is_demo: claims.is_demo,
        }
    }
}

/// Trims and lower-cases an email address for lookup and storage.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
