//! Authentication error types.
//!
//! This module defines the error taxonomy surfaced by the auth core. Every
//! variant maps to exactly one HTTP status (see
//! [`middleware::error`](crate::middleware::error)).

use std::fmt;

use crate::csrf::CsrfRejection;
use crate::refresh::RefreshTokenError;
use crate::reset::PasswordResetError;
use crate::token::TokenError;

/// Generic message sent for every credential failure.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Errors that can occur during authentication and session operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed or missing input.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what is wrong with the input.
        message: String,
    },

    /// Bad credentials, or an invalid or absent token.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Client-safe description. Kept generic to prevent enumeration.
        message: String,
    },

    /// The access token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The double-submit CSRF check failed.
    #[error("CSRF check failed: {reason}")]
    Csrf {
        /// Which part of the check failed.
        reason: CsrfRejection,
    },

    /// The resource already exists.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflicting resource.
        message: String,
    },

    /// Too many requests for the route class within the window.
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the current window resets.
        retry_after_secs: u64,
        /// Effective request limit for the window.
        limit: u32,
    },

    /// An unexpected storage, signing, or timeout failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Detail for the logs. Never sent to the client.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `Authentication` error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates the generic "invalid credentials" error used by login.
    #[must_use]
    pub fn invalid_credentials() -> Self {
        Self::authentication(INVALID_CREDENTIALS)
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Authentication { .. } | Self::TokenExpired => ErrorCategory::Authentication,
            Self::Csrf { .. } => ErrorCategory::Csrf,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the machine-readable error code sent in response bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Authentication { .. } => "authentication_error",
            Self::TokenExpired => "token_expired",
            Self::Csrf { .. } => "csrf_error",
            Self::Conflict { .. } => "conflict",
            Self::RateLimited { .. } => "rate_limit_exceeded",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            TokenError::InvalidSignature | TokenError::Malformed { .. } => {
                Self::authentication("Invalid token")
            }
            TokenError::Encoding { message } => Self::internal(message),
        }
    }
}

impl From<RefreshTokenError> for AuthError {
    fn from(err: RefreshTokenError) -> Self {
        match err {
            RefreshTokenError::Storage(inner) => inner,
            RefreshTokenError::NotFound | RefreshTokenError::Expired => {
                Self::authentication("Invalid or expired refresh token")
            }
        }
    }
}

impl From<PasswordResetError> for AuthError {
    fn from(err: PasswordResetError) -> Self {
        match err {
            PasswordResetError::Storage(inner) => inner,
            PasswordResetError::NotFound | PasswordResetError::Expired => {
                Self::authentication("Invalid or expired reset token")
            }
        }
    }
}

impl From<CsrfRejection> for AuthError {
    fn from(reason: CsrfRejection) -> Self {
        Self::Csrf { reason }
    }
}

/// Categories of auth errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Request validation errors.
    Validation,
    /// Credential and token errors.
    Authentication,
    /// Cross-site request forgery rejections.
    Csrf,
    /// Duplicate resources.
    Conflict,
    /// Rate limiting rejections.
    RateLimit,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Authentication => write!(f, "authentication"),
            Self::Csrf => write!(f, "csrf"),
            Self::Conflict => write!(f, "conflict"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
