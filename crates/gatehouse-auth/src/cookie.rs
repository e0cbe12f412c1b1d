//! Cookie security policy.
//!
//! Pure functions deciding cookie attributes per token kind and deployment
//! environment. [`CookiePolicy::set`] and [`CookiePolicy::clear`] only accept
//! a [`SignedCookieJar`], so every cookie value is HMAC-signed and
//! tamper-evident.
//!
//! | kind          | HttpOnly | Secure / SameSite=Strict | Max-Age                  |
//! |---------------|----------|--------------------------|--------------------------|
//! | access token  | yes      | production only          | access token lifetime    |
//! | refresh token | yes      | production only          | refresh token lifetime   |
//! | CSRF token    | no       | production only          | `cookies.csrf_max_age`   |
//!
//! [`SignedCookieJar`]: axum_extra::extract::cookie::SignedCookieJar

use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};

use crate::config::{AuthConfig, ConfigError, CookieConfig, MIN_SECRET_LEN, TokenLifetimeConfig};
use crate::environment::Environment;

/// Which cookie is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CookieKind {
    /// Signed access token.
    AccessToken,
    /// Opaque refresh token.
    RefreshToken,
    /// Double-submit CSRF token. Readable by client script.
    Csrf,
}

/// Attribute set for one cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    pub http_only: bool,
    pub secure: bool,
    /// `None` omits the attribute so cross-port development works.
    pub same_site: Option<SameSite>,
    pub domain: Option<String>,
    pub path: &'static str,
    pub max_age: Duration,
}

/// Decides the attributes for a cookie kind in an environment.
#[must_use]
pub fn cookie_attributes(
    kind: CookieKind,
    env: Environment,
    cookies: &CookieConfig,
    tokens: &TokenLifetimeConfig,
) -> CookieAttributes {
    let production = env.is_production();
    let (http_only, max_age) = match kind {
        CookieKind::AccessToken => (true, tokens.access_token_lifetime),
        CookieKind::RefreshToken => (true, tokens.refresh_token_lifetime()),
        CookieKind::Csrf => (false, cookies.csrf_max_age),
    };

    CookieAttributes {
        http_only,
        secure: production,
        same_site: production.then_some(SameSite::Strict),
        domain: cookies.domain.clone(),
        path: "/",
        max_age,
    }
}

/// Attributes for the clear-cookie variant used by logout.
#[must_use]
pub fn clear_cookie_attributes(
    kind: CookieKind,
    env: Environment,
    cookies: &CookieConfig,
    tokens: &TokenLifetimeConfig,
) -> CookieAttributes {
    CookieAttributes {
        max_age: Duration::ZERO,
        ..cookie_attributes(kind, env, cookies, tokens)
    }
}

/// Derives the cookie signing key from the configured secret.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if the secret is shorter than
/// [`MIN_SECRET_LEN`] bytes.
pub fn cookie_key(config: &AuthConfig) -> Result<Key, ConfigError> {
    let secret = config.signing.cookie_secret().as_bytes();
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::InvalidValue(format!(
            "cookie secret must be at least {MIN_SECRET_LEN} bytes"
        )));
    }
    Ok(Key::derive_from(secret))
}

/// Cookie policy bound to one configuration.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    environment: Environment,
    cookies: CookieConfig,
    tokens: TokenLifetimeConfig,
}

impl CookiePolicy {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            environment: config.environment,
            cookies: config.cookies.clone(),
            tokens: config.tokens.clone(),
        }
    }

    /// Configured cookie name for a kind.
    #[must_use]
    pub fn name(&self, kind: CookieKind) -> &str {
        match kind {
            CookieKind::AccessToken => &self.cookies.access_token_name,
            CookieKind::RefreshToken => &self.cookies.refresh_token_name,
            CookieKind::Csrf => &self.cookies.csrf_name,
        }
    }

    #[must_use]
    pub fn attributes(&self, kind: CookieKind) -> CookieAttributes {
        cookie_attributes(kind, self.environment, &self.cookies, &self.tokens)
    }

    /// Adds a signed cookie carrying `value` to `jar`.
    #[must_use]
    pub fn set(
        &self,
        jar: SignedCookieJar,
        kind: CookieKind,
        value: impl Into<String>,
    ) -> SignedCookieJar {
        jar.add(self.build(kind, value))
    }

    /// Adds an empty `Max-Age=0` cookie that makes the browser drop `kind`.
    #[must_use]
    pub fn clear(&self, jar: SignedCookieJar, kind: CookieKind) -> SignedCookieJar {
        jar.add(self.build_clear(kind))
    }

    pub(crate) fn build(&self, kind: CookieKind, value: impl Into<String>) -> Cookie<'static> {
        build_cookie(self.name(kind).to_string(), value.into(), self.attributes(kind))
    }

    pub(crate) fn build_clear(&self, kind: CookieKind) -> Cookie<'static> {
        let attrs = clear_cookie_attributes(kind, self.environment, &self.cookies, &self.tokens);
        build_cookie(self.name(kind).to_string(), String::new(), attrs)
    }
}

fn build_cookie(name: String, value: String, attrs: CookieAttributes) -> Cookie<'static> {
    let max_age = time::Duration::seconds(i64::try_from(attrs.max_age.as_secs()).unwrap_or(i64::MAX));

    let mut builder = Cookie::build((name, value))
        .http_only(attrs.http_only)
        .secure(attrs.secure)
        .path(attrs.path)
        .max_age(max_age);
    if let Some(same_site) = attrs.same_site {
        builder = builder.same_site(same_site);
    }
    if let Some(domain) = attrs.domain {
        builder = builder.domain(domain);
    }
    builder.build()
}
