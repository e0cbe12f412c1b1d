//! Double-submit CSRF protection.
//!
//! The guard keeps no server-side state. A random token lives in a signed,
//! script-readable cookie; state-changing requests must echo the same value
//! in the `X-CSRF-Token` header. Per request:
//!
//! 1. `GET`, `HEAD` and `OPTIONS` pass, and a cookie is minted if absent.
//! 2. Exempt paths pass, and a cookie is minted if absent.
//! 3. Otherwise both cookie and header must be present, and they must be equal
//!    under a constant-time comparison.
//!
//! An existing valid cookie is never overwritten. A cookie whose signature
//! does not verify is treated as missing.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderName, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::warn;

use crate::config::{AuthConfig, ConfigError};
use crate::cookie::{CookieKind, CookiePolicy};
use crate::error::AuthError;
use crate::path_pattern;

/// Why a request failed the CSRF check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CsrfRejection {
    #[error("CSRF cookie missing")]
    MissingCookie,
    #[error("CSRF header missing")]
    MissingHeader,
    #[error("CSRF token mismatch")]
    Mismatch,
}

impl CsrfRejection {
    /// Short machine-readable reason for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCookie => "missing_cookie",
            Self::MissingHeader => "missing_header",
            Self::Mismatch => "mismatch",
        }
    }
}

/// The CSRF token in force for the current request.
///
/// Inserted into request extensions by [`csrf_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

/// Generates a random CSRF token (64 hex characters).
#[must_use]
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time string equality.
#[must_use]
pub fn tokens_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

/// Double-submit CSRF guard.
#[derive(Clone)]
pub struct CsrfGuard {
    header_name: HeaderName,
    exempt_paths: Vec<String>,
    policy: CookiePolicy,
    key: Key,
}

impl CsrfGuard {
    /// Creates a guard from the auth configuration and cookie signing key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `csrf.header_name` is not a
    /// valid header name.
    pub fn new(config: &AuthConfig, key: Key) -> Result<Self, ConfigError> {
        let header_name = HeaderName::from_bytes(config.csrf.header_name.to_ascii_lowercase().as_bytes())
            .map_err(|e| ConfigError::InvalidValue(format!("csrf.header_name: {e}")))?;

        Ok(Self {
            header_name,
            exempt_paths: config.csrf.exempt_paths.clone(),
            policy: CookiePolicy::new(config),
            key,
        })
    }

    #[must_use]
    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        self.policy.name(CookieKind::Csrf)
    }

    /// Returns `true` if `path` skips validation.
    #[must_use]
    pub fn is_exempt(&self, path: &str) -> bool {
        path_pattern::matches_any(&self.exempt_paths, path)
    }

    /// Runs the check for one request.
    ///
    /// # Errors
    ///
    /// Returns the [`CsrfRejection`] describing which part failed.
    pub fn check(
        &self,
        method: &Method,
        path: &str,
        cookie: Option<&str>,
        header: Option<&str>,
    ) -> Result<(), CsrfRejection> {
        if is_safe_method(method) || self.is_exempt(path) {
            return Ok(());
        }

        let cookie = cookie.ok_or(CsrfRejection::MissingCookie)?;
        let header = header.ok_or(CsrfRejection::MissingHeader)?;

        if tokens_match(cookie, header) {
            Ok(())
        } else {
            Err(CsrfRejection::Mismatch)
        }
    }
}

impl std::fmt::Debug for CsrfGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfGuard")
            .field("header_name", &self.header_name)
            .field("exempt_paths", &self.exempt_paths)
            .finish_non_exhaustive()
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// CSRF middleware for `axum::middleware::from_fn_with_state`.
pub async fn csrf_middleware(
    State(guard): State<Arc<CsrfGuard>>,
    mut request: Request,
    next: Next,
) -> Response {
    let jar = SignedCookieJar::from_headers(request.headers(), guard.key.clone());
    let cookie_token = jar
        .get(guard.cookie_name())
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    let header_token = request
        .headers()
        .get(&guard.header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .filter(|v| !v.is_empty());

    if let Err(reason) = guard.check(
        request.method(),
        request.uri().path(),
        cookie_token.as_deref(),
        header_token.as_deref(),
    ) {
        warn!(
            reason = reason.as_str(),
            method = %request.method(),
            path = %request.uri().path(),
            "CSRF check failed"
        );
        return AuthError::from(reason).into_response();
    }

    let (token, minted) = match cookie_token {
        Some(token) => (token, false),
        None => (generate_csrf_token(), true),
    };
    request.extensions_mut().insert(CsrfToken(token.clone()));

    let response = next.run(request).await;

    if minted {
        let jar = guard.policy.set(jar, CookieKind::Csrf, token);
        (jar, response).into_response()
    } else {
        response
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::cookie::cookie_key;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::extract::Extension;
    use axum::http::{StatusCode, header};
    use axum::middleware::from_fn_with_state;
    use axum::routing::{get, post};
    use tower::ServiceExt;

    /// Builds a `Cookie` request header value carrying a signed cookie.
    pub(crate) fn signed_cookie(key: &Key, name: &str, value: &str) -> String {
        let mut jar = cookie::CookieJar::new();
        jar.signed_mut(key)
            .add(cookie::Cookie::new(name.to_string(), value.to_string()));
        let signed = jar.get(name).map(|c| c.value().to_string()).unwrap();
        format!("{name}={signed}")
    }

    fn guard() -> (Arc<CsrfGuard>, Key) {
        let config = test_config();
        let key = cookie_key(&config).unwrap();
        (Arc::new(CsrfGuard::new(&config, key.clone()).unwrap()), key)
    }

    fn app(guard: Arc<CsrfGuard>) -> Router {
        Router::new()
            .route(
                "/token",
                get(|Extension(token): Extension<CsrfToken>| async move { token.0 }),
            )
            .route("/auth/logout", post(|| async { "ok" }))
            .route("/auth/login", post(|| async { "ok" }))
            .layer(from_fn_with_state(guard, csrf_middleware))
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_generate_csrf_token_is_64_hex_chars() {
        let token = generate_csrf_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_csrf_token());
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("abc", "abcd"));
        assert!(!tokens_match("", "a"));
    }

    #[test]
    fn test_check_state_machine() {
        let (guard, _) = guard();

        assert!(guard.check(&Method::GET, "/auth/validate", None, None).is_ok());
        assert!(guard.check(&Method::OPTIONS, "/x", None, None).is_ok());
        assert!(guard.check(&Method::POST, "/auth/login", None, None).is_ok());

        assert_eq!(
            guard.check(&Method::POST, "/auth/logout", None, Some("a")),
            Err(CsrfRejection::MissingCookie)
        );
        assert_eq!(
            guard.check(&Method::POST, "/auth/logout", Some("a"), None),
            Err(CsrfRejection::MissingHeader)
        );
        assert_eq!(
            guard.check(&Method::DELETE, "/auth/logout", Some("a"), Some("b")),
            Err(CsrfRejection::Mismatch)
        );
        assert!(
            guard
                .check(&Method::PUT, "/auth/logout", Some("a"), Some("a"))
                .is_ok()
        );
    }

    #[test]
    fn test_wildcard_exemption() {
        let mut config = test_config();
        config.csrf.exempt_paths = vec!["/webhooks/*".to_string()];
        let key = cookie_key(&config).unwrap();
        let guard = CsrfGuard::new(&config, key).unwrap();
        assert!(guard.is_exempt("/webhooks/stripe"));
        assert!(!guard.is_exempt("/auth/login"));
    }

    #[test]
    fn test_invalid_header_name_is_config_error() {
        let mut config = test_config();
        config.csrf.header_name = "bad header".to_string();
        let key = cookie_key(&config).unwrap();
        assert!(CsrfGuard::new(&config, key).is_err());
    }

    #[tokio::test]
    async fn test_safe_request_mints_cookie() {
        let (guard, _) = guard();
        let response = app(guard)
            .oneshot(Request::builder().uri("/token").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("csrf-token="));
        assert!(!set_cookie.contains("HttpOnly"));

        let token = body_string(response).await;
        assert_eq!(token.len(), 64);
        assert!(set_cookie.contains(&token));
    }

    #[tokio::test]
    async fn test_existing_cookie_is_not_overwritten() {
        let (guard, key) = guard();
        let response = app(guard)
            .oneshot(
                Request::builder()
                    .uri("/token")
                    .header(header::COOKIE, signed_cookie(&key, "csrf-token", "existing"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_string(response).await, "existing");
    }

    #[tokio::test]
    async fn test_unsigned_cookie_counts_as_missing() {
        let (guard, _) = guard();
        let response = app(guard)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/auth/logout")
                    .header(header::COOKIE, "csrf-token=forged")
                    .header("x-csrf-token", "forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_string(response).await.contains("CSRF cookie missing"));
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let (guard, key) = guard();
        let response = app(guard)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/auth/logout")
                    .header(header::COOKIE, signed_cookie(&key, "csrf-token", "tok"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_string(response).await.contains("CSRF header missing"));
    }

    #[tokio::test]
    async fn test_mismatch_rejected_and_match_accepted() {
        let (guard, key) = guard();
        let cookie = signed_cookie(&key, "csrf-token", "tok");

        let response = app(guard.clone())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/auth/logout")
                    .header(header::COOKIE, cookie.clone())
                    .header("X-CSRF-Token", "other")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_string(response).await.contains("CSRF token mismatch"));

        let response = app(guard)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/auth/logout")
                    .header(header::COOKIE, cookie)
                    .header("X-CSRF-Token", "tok")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_exempt_post_mints_cookie() {
        let (guard, _) = guard();
        let response = app(guard)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/auth/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_some());
    }
}
