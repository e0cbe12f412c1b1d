//! Session authentication extractor.
//!
//! # Example
//!
//! ```ignore
//! use gatehouse_auth::middleware::SessionAuth;
//!
//! async fn me(SessionAuth(user): SessionAuth) -> String {
//!     format!("tenant {}", user.tenant_id)
//! }
//! ```

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Key, SignedCookieJar};

use crate::cookie::{CookieKind, CookiePolicy};
use crate::device::ClientContext;
use crate::error::AuthError;
use crate::service::AuthService;
use crate::token::access_token;
use crate::types::SessionUser;

/// State shared by the auth handlers and extractors.
///
/// Include it in the application state and expose it with `FromRef`.
#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthService>,
    pub cookies: CookiePolicy,
    /// Signs and verifies every auth cookie.
    pub key: Key,
    /// Take the client address from `X-Forwarded-For`.
    pub trust_proxy: bool,
}

impl AuthState {
    #[must_use]
    pub fn new(service: Arc<AuthService>, cookies: CookiePolicy, key: Key) -> Self {
        Self {
            service,
            cookies,
            key,
            trust_proxy: false,
        }
    }

    #[must_use]
    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }
}

impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.key.clone()
    }
}

/// Authenticated identity of the caller.
///
/// Reads the signed access-token cookie, falling back to a bearer header.
/// Rejects with 401 when the token is absent, invalid or expired.
pub struct SessionAuth(pub SessionUser);

impl<S> FromRequestParts<S> for SessionAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);
        let jar = SignedCookieJar::from_headers(&parts.headers, auth.key.clone());
        let token = access_token(&jar, &parts.headers, auth.cookies.name(CookieKind::AccessToken));

        auth.service.validate(token.as_deref()).map(SessionAuth)
    }
}

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);
        Ok(Self::from_request(&parts.headers, &parts.extensions, auth.trust_proxy))
    }
}
