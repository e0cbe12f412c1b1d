//! Error response handling.
//!
//! `AuthError` renders as `{"error": <message>, "code": <code>}` with the
//! status from the taxonomy below. Internal errors are logged with full detail
//! and sent with a generic message.
//!
//! | variant          | status |
//! |------------------|--------|
//! | `Validation`     | 400    |
//! | `Authentication` | 401    |
//! | `TokenExpired`   | 401    |
//! | `Csrf`           | 403    |
//! | `Conflict`       | 409    |
//! | `RateLimited`    | 429    |
//! | `Internal`       | 500    |

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;
use crate::rate_limit::{RATELIMIT_LIMIT, RATELIMIT_REMAINING, RATELIMIT_RESET};

/// Realm advertised in `WWW-Authenticate`.
pub const REALM: &str = "gatehouse";

impl AuthError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Authentication { .. } | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::Csrf { .. } => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to send to the client.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation { message }
            | Self::Authentication { message }
            | Self::Conflict { message } => message.clone(),
            Self::TokenExpired => "Token expired".to_string(),
            Self::Csrf { reason } => reason.to_string(),
            Self::RateLimited { .. } => "Too many requests, please try again later".to_string(),
            Self::Internal { .. } => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let Self::Internal { message } = &self {
            tracing::error!(error = %message, "internal auth error");
        }

        let body = json!({
            "error": self.client_message(),
            "code": self.code(),
        });

        let mut headers = HeaderMap::new();

        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(self.code());
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        if let Self::RateLimited {
            retry_after_secs,
            limit,
        } = self
        {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(RATELIMIT_REMAINING, HeaderValue::from(0u32));
            headers.insert(RATELIMIT_RESET, HeaderValue::from(retry_after_secs));
        }

        (status, headers, Json(body)).into_response()
    }
}

/// Builds the `WWW-Authenticate` header value.
fn build_www_authenticate_header(code: &str) -> String {
    format!("Bearer realm=\"{REALM}\", error=\"{code}\"")
}
