//! Access token extraction from requests.
//!
//! The signed access-token cookie takes precedence over an
//! `Authorization: Bearer` header when both are present. Browsers always send
//! the cookie, so the header is only consulted by non-browser clients.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum_extra::extract::cookie::SignedCookieJar;

/// Returns the bearer token from the `Authorization` header, if any.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Returns the verified value of a signed cookie, if present and non-empty.
#[must_use]
pub fn signed_cookie_value(jar: &SignedCookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolves the access token: cookie first, then bearer header.
#[must_use]
pub fn access_token(jar: &SignedCookieJar, headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    signed_cookie_value(jar, cookie_name).or_else(|| bearer_token(headers))
}
