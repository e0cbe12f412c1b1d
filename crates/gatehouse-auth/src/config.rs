//! Authentication and session configuration.
//!
//! `AuthConfig` is built once at process start and handed to every component
//! constructor. Nothing in this crate reads environment variables directly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::environment::Environment;
use crate::rate_limit::RouteClass;

/// Minimum length in bytes for signing and cookie secrets.
pub const MIN_SECRET_LEN: usize = 32;

/// Upper bound for `tokens.access_token_lifetime`.
pub const MAX_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Upper bound for `tokens.refresh_token_lifetime_days`.
pub const MAX_REFRESH_TOKEN_LIFETIME_DAYS: u32 = 3650;

/// Upper bound for `tokens.password_reset_lifetime_minutes`.
pub const MAX_PASSWORD_RESET_LIFETIME_MINUTES: u32 = 24 * 60;

/// Root authentication configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// environment = "production"
///
/// [auth.signing]
/// secret = "…at least 32 bytes…"
///
/// [auth.tokens]
/// access_token_lifetime = "15m"
/// refresh_token_lifetime_days = 7
///
/// [auth.rate_limiting.login]
/// window = "15m"
/// max_requests = 5
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Deployment environment.
    pub environment: Environment,

    /// Token and cookie signing.
    pub signing: SigningConfig,

    /// Token lifetimes and rotation policy.
    pub tokens: TokenLifetimeConfig,

    /// Cookie names and domain.
    pub cookies: CookieConfig,

    /// CSRF guard settings.
    pub csrf: CsrfConfig,

    /// Per-route-class rate limits.
    pub rate_limiting: RateLimitingConfig,

    /// Password reset link settings.
    pub password_reset: PasswordResetConfig,

    /// Self-service registration.
    pub registration: RegistrationConfig,

    /// Upper bound for any single storage call.
    #[serde(with = "humantime_serde")]
    pub storage_timeout: Duration,

    /// Background maintenance.
    pub maintenance: MaintenanceConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            signing: SigningConfig::default(),
            tokens: TokenLifetimeConfig::default(),
            cookies: CookieConfig::default(),
            csrf: CsrfConfig::default(),
            rate_limiting: RateLimitingConfig::default(),
            password_reset: PasswordResetConfig::default(),
            registration: RegistrationConfig::default(),
            storage_timeout: Duration::from_secs(5),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

/// Signing configuration for access tokens and cookies.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// HMAC secret for access tokens.
    pub secret: String,

    /// Issuer claim written into and required from every access token.
    pub issuer: String,

    /// Master key for cookie signatures. Falls back to `secret`.
    pub cookie_secret: Option<String>,
}

impl SigningConfig {
    /// Returns the secret used to derive the cookie signing key.
    #[must_use]
    pub fn cookie_secret(&self) -> &str {
        self.cookie_secret.as_deref().unwrap_or(&self.secret)
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "gatehouse".to_string(),
            cookie_secret: None,
        }
    }
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field(
                "cookie_secret",
                &self.cookie_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Token lifetimes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenLifetimeConfig {
    /// Access token lifetime. Also the access cookie max-age.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime in days. Also the refresh cookie max-age.
    pub refresh_token_lifetime_days: u32,

    /// Password reset token lifetime in minutes.
    pub password_reset_lifetime_minutes: u32,

    /// Delete the refresh token on use and issue a new one.
    /// When disabled the token stays alive until it expires (sliding session).
    pub refresh_token_rotation: bool,
}

impl TokenLifetimeConfig {
    /// Refresh token lifetime as a `Duration`.
    #[must_use]
    pub fn refresh_token_lifetime(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_token_lifetime_days) * 24 * 3600)
    }

    /// Password reset token lifetime as a `Duration`.
    #[must_use]
    pub fn password_reset_lifetime(&self) -> Duration {
        Duration::from_secs(u64::from(self.password_reset_lifetime_minutes) * 60)
    }
}

impl Default for TokenLifetimeConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(15 * 60),
            refresh_token_lifetime_days: 7,
            password_reset_lifetime_minutes: 60,
            refresh_token_rotation: true,
        }
    }
}

/// Cookie names and scope.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie domain. Should start with `.` to be shared with subdomains.
    pub domain: Option<String>,

    /// Access token cookie name.
    pub access_token_name: String,

    /// Refresh token cookie name.
    pub refresh_token_name: String,

    /// CSRF token cookie name.
    pub csrf_name: String,

    /// CSRF cookie max-age.
    #[serde(with = "humantime_serde")]
    pub csrf_max_age: Duration,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            domain: None,
            access_token_name: "accessToken".to_string(),
            refresh_token_name: "refreshToken".to_string(),
            csrf_name: "csrf-token".to_string(),
            csrf_max_age: Duration::from_secs(24 * 3600),
        }
    }
}

/// CSRF guard settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Request header carrying the echoed token (matched case-insensitively).
    pub header_name: String,

    /// Path patterns that skip validation. A trailing `*` is a wildcard;
    /// every entry also matches by prefix.
    pub exempt_paths: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            header_name: "x-csrf-token".to_string(),
            exempt_paths: vec![
                "/auth/login".to_string(),
                "/auth/register".to_string(),
                "/auth/forgot-password".to_string(),
                "/auth/reset-password".to_string(),
                "/health".to_string(),
            ],
        }
    }
}

/// A fixed window request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitRule {
    /// Window length.
    #[serde(with = "humantime_serde")]
    pub window: Duration,

    /// Requests allowed per key within one window.
    pub max_requests: u32,
}

impl RateLimitRule {
    /// Creates a rule from a window in seconds and a request budget.
    #[must_use]
    pub const fn new(window_secs: u64, max_requests: u32) -> Self {
        Self {
            window: Duration::from_secs(window_secs),
            max_requests,
        }
    }
}

/// Binds a path pattern to a route class.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteBinding {
    /// Path pattern, same syntax as CSRF exemptions.
    pub path: String,

    /// Route class whose budget the path consumes.
    pub class: RouteClass,
}

impl RouteBinding {
    #[must_use]
    pub fn new(path: &str, class: RouteClass) -> Self {
        Self {
            path: path.to_string(),
            class,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitingConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Use the left-most `X-Forwarded-For` entry as the client key.
    /// Only enable behind a trusted reverse proxy.
    pub trust_proxy: bool,

    /// Multiplier applied to every budget in development.
    pub development_multiplier: u32,

    /// Health check path. Always exempt.
    pub health_path: String,

    /// Additional exempt path patterns.
    pub exempt_paths: Vec<String>,

    /// Path-to-class bindings, first match wins.
    pub routes: Vec<RouteBinding>,

    pub login: RateLimitRule,
    pub password_reset: RateLimitRule,
    pub password_reset_short: RateLimitRule,
    pub authenticated_general: RateLimitRule,
    pub invitation: RateLimitRule,
    pub super_admin: RateLimitRule,
    pub verification_email: RateLimitRule,
    pub bulk_import: RateLimitRule,
}

impl RateLimitingConfig {
    /// Returns the configured rule for a route class.
    #[must_use]
    pub fn rule(&self, class: RouteClass) -> RateLimitRule {
        match class {
            RouteClass::Login => self.login,
            RouteClass::PasswordReset => self.password_reset,
            RouteClass::PasswordResetShort => self.password_reset_short,
            RouteClass::AuthenticatedGeneral => self.authenticated_general,
            RouteClass::Invitation => self.invitation,
            RouteClass::SuperAdmin => self.super_admin,
            RouteClass::VerificationEmail => self.verification_email,
            RouteClass::BulkImport => self.bulk_import,
        }
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trust_proxy: false,
            development_multiplier: 10,
            health_path: "/health".to_string(),
            exempt_paths: Vec::new(),
            routes: vec![
                RouteBinding::new("/auth/login", RouteClass::Login),
                RouteBinding::new("/auth/register", RouteClass::Login),
                RouteBinding::new("/auth/forgot-password", RouteClass::PasswordReset),
                RouteBinding::new("/auth/reset-password", RouteClass::PasswordResetShort),
                RouteBinding::new("/auth/*", RouteClass::AuthenticatedGeneral),
            ],
            login: RateLimitRule::new(15 * 60, 5),
            password_reset: RateLimitRule::new(3600, 3),
            password_reset_short: RateLimitRule::new(60, 1),
            authenticated_general: RateLimitRule::new(15 * 60, 300),
            invitation: RateLimitRule::new(3600, 20),
            super_admin: RateLimitRule::new(15 * 60, 100),
            verification_email: RateLimitRule::new(3600, 3),
            bulk_import: RateLimitRule::new(3600, 10),
        }
    }
}

/// Password reset link settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PasswordResetConfig {
    /// Page that receives the reset token as the `token` query parameter.
    pub link_base_url: String,
}

impl Default for PasswordResetConfig {
    fn default() -> Self {
        Self {
            link_base_url: "http://localhost:3000/reset-password".to_string(),
        }
    }
}

/// Self-service registration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Allow `POST /auth/register`.
    pub enabled: bool,

    /// Role claim given to self-registered users.
    pub default_role: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_role: "owner".to_string(),
        }
    }
}

/// Background maintenance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// How often expired tokens and stale rate-limit windows are purged.
    #[serde(with = "humantime_serde")]
    pub purge_interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            purge_interval: Duration::from_secs(3600),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// A cookie domain without a leading dot is logged as a warning and
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the signing secret is empty, and
    /// `ConfigError::InvalidValue` if:
    /// - a secret is shorter than [`MIN_SECRET_LEN`] bytes
    /// - a lifetime, window, request budget or timeout is zero
    /// - a token lifetime exceeds its `MAX_*` bound
    /// - the development multiplier is zero
    /// - the reset link base URL does not parse
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing.secret.is_empty() {
            return Err(ConfigError::Missing("signing.secret".to_string()));
        }
        if self.signing.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "signing.secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.signing.cookie_secret().len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "signing.cookie_secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.signing.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "signing.issuer cannot be empty".to_string(),
            ));
        }

        if self.tokens.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "tokens.access_token_lifetime must be > 0".to_string(),
            ));
        }
        if self.tokens.access_token_lifetime > MAX_ACCESS_TOKEN_LIFETIME {
            return Err(ConfigError::InvalidValue(format!(
                "tokens.access_token_lifetime must be at most {}s",
                MAX_ACCESS_TOKEN_LIFETIME.as_secs()
            )));
        }
        if self.tokens.refresh_token_lifetime_days == 0 {
            return Err(ConfigError::InvalidValue(
                "tokens.refresh_token_lifetime_days must be > 0".to_string(),
            ));
        }
        if self.tokens.refresh_token_lifetime_days > MAX_REFRESH_TOKEN_LIFETIME_DAYS {
            return Err(ConfigError::InvalidValue(format!(
                "tokens.refresh_token_lifetime_days must be at most {MAX_REFRESH_TOKEN_LIFETIME_DAYS}"
            )));
        }
        if self.tokens.password_reset_lifetime_minutes == 0 {
            return Err(ConfigError::InvalidValue(
                "tokens.password_reset_lifetime_minutes must be > 0".to_string(),
            ));
        }
        if self.tokens.password_reset_lifetime_minutes > MAX_PASSWORD_RESET_LIFETIME_MINUTES {
            return Err(ConfigError::InvalidValue(format!(
                "tokens.password_reset_lifetime_minutes must be at most {MAX_PASSWORD_RESET_LIFETIME_MINUTES}"
            )));
        }

        if let Some(domain) = &self.cookies.domain
            && !domain.starts_with('.')
        {
            tracing::warn!(
                domain = %domain,
                "cookie domain has no leading dot; cookies will not be shared with subdomains"
            );
        }
        if self.cookies.csrf_max_age.is_zero() {
            return Err(ConfigError::InvalidValue(
                "cookies.csrf_max_age must be > 0".to_string(),
            ));
        }

        if self.csrf.header_name.is_empty() {
            return Err(ConfigError::InvalidValue(
                "csrf.header_name cannot be empty".to_string(),
            ));
        }

        if self.rate_limiting.development_multiplier == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limiting.development_multiplier must be > 0".to_string(),
            ));
        }
        for class in RouteClass::ALL {
            let rule = self.rate_limiting.rule(class);
            if rule.window.is_zero() || rule.max_requests == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "rate_limiting.{class} needs a non-zero window and max_requests"
                )));
            }
        }

        if self.storage_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "storage_timeout must be > 0".to_string(),
            ));
        }
        if self.maintenance.purge_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "maintenance.purge_interval must be > 0".to_string(),
            ));
        }

        url::Url::parse(&self.password_reset.link_base_url).map_err(|e| {
            ConfigError::InvalidValue(format!("password_reset.link_base_url: {e}"))
        })?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AuthConfig {
    AuthConfig {
        environment: Environment::Test,
        signing: SigningConfig {
            secret: "test-signing-secret-that-is-long-enough-0123456789".to_string(),
            ..SigningConfig::default()
        },
        ..AuthConfig::default()
    }
}
