//! Access token minting and verification.
//!
//! Access tokens are HS256 JWTs signed with the server secret. They are
//! stateless: there is no revocation list, so a leaked token stays valid until
//! `exp`. Keep the lifetime short.
//!
//! ## Example
//!
//! ```ignore
//! let issuer = TokenIssuer::new(secret.as_bytes(), "gatehouse", Duration::from_secs(900));
//! let token = issuer.mint(&session_user, issuer.default_ttl())?;
//! let claims = issuer.verify(&token)?;
//! ```

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::types::SessionUser;

/// Errors that can occur while minting or verifying an access token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// `exp` has passed.
    #[error("Token expired")]
    Expired,

    /// The signature does not match.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Not a decodable token, wrong algorithm, wrong issuer or bad claims.
    #[error("Malformed token: {message}")]
    Malformed {
        /// Description of the decoding error.
        message: String,
    },

    /// Failed to sign a token.
    #[error("Failed to encode token: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },
}

impl TokenError {
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::malformed(err.to_string()),
        }
    }
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenClaims {
    /// Issuer.
    pub iss: String,

    /// Subject (user id).
    pub sub: Uuid,

    /// Tenant the user belongs to.
    pub tenant_id: Uuid,

    /// Role claim. Not evaluated here.
    pub role: String,

    /// Demo account flag.
    pub is_demo: bool,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Unique token id.
    pub jti: String,
}

impl AccessTokenClaims {
    /// Creates a new builder for access token claims.
    #[must_use]
    pub fn builder(issuer: impl Into<String>, user: &SessionUser) -> AccessTokenClaimsBuilder {
        AccessTokenClaimsBuilder::new(issuer, user)
    }
}

/// Builder for `AccessTokenClaims`.
pub struct AccessTokenClaimsBuilder {
    claims: AccessTokenClaims,
}

impl AccessTokenClaimsBuilder {
    fn new(issuer: impl Into<String>, user: &SessionUser) -> Self {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            claims: AccessTokenClaims {
                iss: issuer.into(),
                sub: user.id,
                tenant_id: user.tenant_id,
                role: user.role.clone(),
                is_demo: user.is_demo,
                iat: now,
                exp: now + 900,
                jti: Uuid::new_v4().to_string(),
            },
        }
    }

    /// Sets the expiration relative to `iat`.
    #[must_use]
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        self.claims.exp = self.claims.iat.saturating_add(secs);
        self
    }

    /// Sets an absolute expiration time.
    #[must_use]
    pub fn expires_at(mut self, exp: i64) -> Self {
        self.claims.exp = exp;
        self
    }

    #[must_use]
    pub fn build(self) -> AccessTokenClaims {
        self.claims
    }
}

/// Mints and verifies access tokens.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    default_ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &[u8], issuer: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            default_ttl,
        }
    }

    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.signing.secret.as_bytes(),
            config.signing.issuer.clone(),
            config.tokens.access_token_lifetime,
        )
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Configured access token lifetime.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Mints a token for `user` valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn mint(&self, user: &SessionUser, ttl: Duration) -> Result<String, TokenError> {
        let claims = AccessTokenClaims::builder(&self.issuer, user)
            .expires_in(ttl)
            .build();
        self.encode(&claims)
    }

    /// Signs arbitrary claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn encode(&self, claims: &AccessTokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            TokenError::Encoding {
                message: e.to_string(),
            }
        })
    }

    /// Verifies signature, algorithm, issuer and expiry.
    ///
    /// No leeway is applied to `exp`.
    ///
    /// # Errors
    ///
    /// Returns `Expired`, `InvalidSignature` or `Malformed`.
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;
        validation.leeway = 0;

        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, "gatehouse", Duration::from_secs(900))
    }

    fn user() -> SessionUser {
        SessionUser {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: "owner".to_string(),
            is_demo: false,
        }
    }

    #[test]
    fn test_mint_and_verify() {
        let issuer = issuer();
        let user = user();
        let token = issuer.mint(&user, issuer.default_ttl()).unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.tenant_id, user.tenant_id);
        assert_eq!(claims.role, "owner");
        assert_eq!(claims.iss, "gatehouse");
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(SessionUser::from(&claims), user);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = issuer();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AccessTokenClaims::builder("gatehouse", &user())
            .expires_at(now - 5)
            .build();
        let token = issuer.encode(&claims).unwrap();

        assert!(matches!(issuer.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issuer().mint(&user(), Duration::from_secs(60)).unwrap();
        let other = TokenIssuer::new(b"another-secret-another-secret-xx", "gatehouse", Duration::from_secs(60));
        assert!(matches!(
            other.verify(&token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let token = issuer().mint(&user(), Duration::from_secs(60)).unwrap();
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let forged = AccessTokenClaims::builder("gatehouse", &SessionUser {
            role: "super_admin".to_string(),
            ..user()
        })
        .build();
        parts[1] = base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            serde_json::to_vec(&forged).unwrap(),
        );
        let forged_token = parts.join(".");

        assert!(matches!(
            issuer().verify(&forged_token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let token = TokenIssuer::new(SECRET, "someone-else", Duration::from_secs(60))
            .mint(&user(), Duration::from_secs(60))
            .unwrap();
        assert!(matches!(
            issuer().verify(&token),
            Err(TokenError::Malformed { .. })
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            issuer().verify("not-a-jwt"),
            Err(TokenError::Malformed { .. })
        ));
    }

    #[test]
    fn test_debug_hides_keys() {
        let debug = format!("{:?}", issuer());
        assert!(debug.contains("gatehouse"));
        assert!(!debug.contains("0123456789abcdef"));
    }
}
