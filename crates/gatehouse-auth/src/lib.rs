//! # gatehouse-auth
//!
//! Authentication and session security core for Gatehouse.
//!
//! This crate provides:
//! - Short-lived signed access tokens and opaque, rotating refresh tokens
//! - Hardened, signed session cookies whose attributes follow the deployment
//!   environment
//! - Stateless double-submit CSRF protection
//! - Fixed-window rate limiting per client and route class
//! - Registration, password change and a single-use password reset flow
//!
//! ## Modules
//!
//! - [`config`] - Auth configuration and validation
//! - [`environment`] - Deployment environment
//! - [`token`] - Access token issuing, verification and extraction
//! - [`refresh`] - Refresh token lifecycle
//! - [`reset`] - Password reset tokens
//! - [`cookie`] - Cookie policy
//! - [`csrf`] - Double-submit CSRF guard
//! - [`rate_limit`] - Rate limiter
//! - [`service`] - Auth flow orchestration
//! - [`http`] - Axum handlers for the `/auth` endpoints
//! - [`middleware`] - Extractors and error responses
//! - [`storage`] - Storage traits and the in-memory backend

pub mod config;
pub mod cookie;
pub mod csrf;
pub mod device;
pub mod environment;
pub mod error;
pub mod http;
pub mod mailer;
pub mod middleware;
pub mod password;
pub mod path_pattern;
pub mod rate_limit;
pub mod refresh;
pub mod reset;
pub mod service;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError};
pub use cookie::{CookieKind, CookiePolicy, cookie_key};
pub use csrf::{CsrfGuard, CsrfRejection, CsrfToken, csrf_middleware};
pub use device::ClientContext;
pub use environment::Environment;
pub use error::{AuthError, ErrorCategory};
pub use http::auth_router;
pub use middleware::{AuthState, SessionAuth};
pub use rate_limit::{RateLimiter, RouteClass, rate_limit_middleware};
pub use service::{AuthService, Collaborators, IssuedSession, PurgeReport};
pub use storage::{InMemoryAuthStorage, PasswordResetStorage, RefreshTokenStorage, UserStore};
pub use token::{AccessTokenClaims, TokenError, TokenIssuer};
pub use types::{NewUser, SessionUser, User, UserProfile};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use gatehouse_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::cookie::{CookieKind, CookiePolicy};
    pub use crate::csrf::{CsrfGuard, CsrfToken};
    pub use crate::environment::Environment;
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::mailer::Mailer;
    pub use crate::middleware::{AuthState, SessionAuth};
    pub use crate::password::PasswordHasher;
    pub use crate::rate_limit::{RateLimiter, RouteClass};
    pub use crate::service::{AuthService, Collaborators};
    pub use crate::storage::{PasswordResetStorage, RefreshTokenStorage, UserStore};
    pub use crate::types::{SessionUser, UserProfile};
}
