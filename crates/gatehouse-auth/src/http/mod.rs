//! Axum handlers for the `/auth` endpoints.
//!
//! | route                        | handler                     |
//! |------------------------------|-----------------------------|
//! | `POST /auth/login`           | [`login_handler`]           |
//! | `POST /auth/register`        | [`register_handler`]        |
//! | `POST /auth/logout`          | [`logout_handler`]          |
//! | `GET  /auth/validate`        | [`validate_handler`]        |
//! | `POST /auth/refresh`         | [`refresh_handler`]         |
//! | `GET  /auth/csrf-token`      | [`csrf_token_handler`]      |
//! | `POST /auth/change-password` | [`change_password_handler`] |
//! | `POST /auth/forgot-password` | [`forgot_password_handler`] |
//! | `POST /auth/reset-password`  | [`reset_password_handler`]  |
//!
//! The router carries no CSRF or rate-limit layer of its own; the server
//! wraps it with [`csrf_middleware`](crate::csrf::csrf_middleware) and
//! [`rate_limit_middleware`](crate::rate_limit::rate_limit_middleware).

pub mod password;
pub mod session;

use axum::Json;
use axum::Router;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::de::DeserializeOwned;

use crate::error::AuthError;
use crate::middleware::AuthState;

pub use password::{
    ChangePasswordRequest, ForgotPasswordRequest, RESET_REQUESTED_MESSAGE, ResetPasswordRequest,
    change_password_handler, forgot_password_handler, reset_password_handler,
};
pub use session::{
    CsrfTokenResponse, LoginRequest, RegisterRequest, SessionResponse, SuccessResponse,
    ValidateResponse, csrf_token_handler, login_handler, logout_handler, refresh_handler,
    register_handler, validate_handler,
};

/// JSON body extractor whose rejection is a 400 `AuthError::Validation`,
/// except for oversized bodies which stay 413.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            // Oversized bodies keep their 413.
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Err(rejection.into_response())
            }
            Err(rejection) => Err(AuthError::validation(rejection.body_text()).into_response()),
        }
    }
}

/// Builds the `/auth` router.
pub fn auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/validate", get(validate_handler))
        .route("/auth/refresh", post(refresh_handler))
        .route("/auth/csrf-token", get(csrf_token_handler))
        .route("/auth/change-password", post(change_password_handler))
        .route("/auth/forgot-password", post(forgot_password_handler))
        .route("/auth/reset-password", post(reset_password_handler))
        .with_state(state)
}
