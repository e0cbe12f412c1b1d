//! Session endpoints: login, registration, logout, validation, refresh and
//! the CSRF token bootstrap.
//!
//! Tokens only ever travel in signed cookies. Response bodies carry the
//! non-sensitive profile and nothing that could be replayed.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::{Deserialize, Serialize};

use crate::cookie::{CookieKind, CookiePolicy};
use crate::csrf::{CsrfToken, generate_csrf_token};
use crate::device::ClientContext;
use crate::error::AuthError;
use crate::middleware::{AuthState, SessionAuth};
use crate::service::{IssuedSession, Registration};
use crate::token::signed_cookie_value;
use crate::types::{SessionUser, UserProfile};

use super::ValidJson;

/// Body of `POST /auth/login`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Returned whenever a session is established or refreshed.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    pub user: UserProfile,
}

impl From<UserProfile> for SessionResponse {
    fn from(user: UserProfile) -> Self {
        Self {
            success: true,
            user,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    pub user: SessionUser,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// Generic acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

/// Adds the access cookie and, when present, the refresh cookie.
pub(crate) fn set_session_cookies(
    jar: SignedCookieJar,
    policy: &CookiePolicy,
    session: &IssuedSession,
) -> SignedCookieJar {
    let jar = policy.set(jar, CookieKind::AccessToken, session.access_token.clone());
    match &session.refresh_token {
        Some(refresh) => policy.set(jar, CookieKind::RefreshToken, refresh.clone()),
        None => jar,
    }
}

/// Expires both session cookies.
pub(crate) fn clear_session_cookies(jar: SignedCookieJar, policy: &CookiePolicy) -> SignedCookieJar {
    let jar = policy.clear(jar, CookieKind::AccessToken);
    policy.clear(jar, CookieKind::RefreshToken)
}

/// `POST /auth/login`
pub async fn login_handler(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
    client: ClientContext,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<(SignedCookieJar, Json<SessionResponse>), AuthError> {
    let session = state.service.login(&body.email, &body.password, &client).await?;
    let jar = set_session_cookies(jar, &state.cookies, &session);
    Ok((jar, Json(session.profile.into())))
}

/// `POST /auth/register`
pub async fn register_handler(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
    client: ClientContext,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, SignedCookieJar, Json<SessionResponse>), AuthError> {
    let registration = Registration {
        email: body.email,
        password: body.password,
        name: body.name,
    };
    let session = state.service.register(registration, &client).await?;
    let jar = set_session_cookies(jar, &state.cookies, &session);
    Ok((StatusCode::CREATED, jar, Json(session.profile.into())))
}

/// `POST /auth/logout`
///
/// Always succeeds and always expires both session cookies.
pub async fn logout_handler(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
) -> (SignedCookieJar, Json<SuccessResponse>) {
    let refresh = signed_cookie_value(&jar, state.cookies.name(CookieKind::RefreshToken));
    state.service.logout(refresh.as_deref()).await;
    (
        clear_session_cookies(jar, &state.cookies),
        Json(SuccessResponse::ok()),
    )
}

/// `GET /auth/validate`
pub async fn validate_handler(SessionAuth(user): SessionAuth) -> Json<ValidateResponse> {
    Json(ValidateResponse { valid: true, user })
}

/// `POST /auth/refresh`
///
/// A rejected refresh token expires both session cookies.
pub async fn refresh_handler(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
    client: ClientContext,
) -> Response {
    let raw = signed_cookie_value(&jar, state.cookies.name(CookieKind::RefreshToken));
    match state.service.refresh(raw.as_deref(), &client).await {
        Ok(session) => {
            let jar = set_session_cookies(jar, &state.cookies, &session);
            (jar, Json(SessionResponse::from(session.profile))).into_response()
        }
        Err(err) => (clear_session_cookies(jar, &state.cookies), err).into_response(),
    }
}

/// `GET /auth/csrf-token`
///
/// Returns the token in force for this browser, minting one when the CSRF
/// layer is not installed and no valid cookie exists.
pub async fn csrf_token_handler(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
    current: Option<Extension<CsrfToken>>,
) -> (SignedCookieJar, Json<CsrfTokenResponse>) {
    if let Some(Extension(CsrfToken(csrf_token))) = current {
        return (jar, Json(CsrfTokenResponse { csrf_token }));
    }

    let name = state.cookies.name(CookieKind::Csrf);
    match signed_cookie_value(&jar, name) {
        Some(csrf_token) => (jar, Json(CsrfTokenResponse { csrf_token })),
        None => {
            let csrf_token = generate_csrf_token();
            let jar = state.cookies.set(jar, CookieKind::Csrf, csrf_token.clone());
            (jar, Json(CsrfTokenResponse { csrf_token }))
        }
    }
}
