//! Password endpoints.

use axum::Json;
use axum::extract::State;
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Deserialize;

use crate::device::ClientContext;
use crate::error::AuthError;
use crate::middleware::{AuthState, SessionAuth};

use super::ValidJson;
use super::session::{SessionResponse, SuccessResponse, set_session_cookies};

/// Sent for every forgot-password request, known email or not.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that email, a reset link has been sent";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// `POST /auth/change-password`
///
/// Revokes every other session and replaces the caller's cookies.
pub async fn change_password_handler(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
    client: ClientContext,
    SessionAuth(user): SessionAuth,
    ValidJson(body): ValidJson<ChangePasswordRequest>,
) -> Result<(SignedCookieJar, Json<SessionResponse>), AuthError> {
    let session = state
        .service
        .change_password(user.id, &body.current_password, &body.new_password, &client)
        .await?;
    let jar = set_session_cookies(jar, &state.cookies, &session);
    Ok((jar, Json(session.profile.into())))
}

/// `POST /auth/forgot-password`
pub async fn forgot_password_handler(
    State(state): State<AuthState>,
    client: ClientContext,
    ValidJson(body): ValidJson<ForgotPasswordRequest>,
) -> Result<Json<SuccessResponse>, AuthError> {
    state
        .service
        .request_password_reset(&body.email, &client)
        .await?;
    Ok(Json(SuccessResponse::with_message(RESET_REQUESTED_MESSAGE)))
}

/// `POST /auth/reset-password`
pub async fn reset_password_handler(
    State(state): State<AuthState>,
    ValidJson(body): ValidJson<ResetPasswordRequest>,
) -> Result<Json<SuccessResponse>, AuthError> {
    state
        .service
        .reset_password(&body.token, &body.new_password)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}
