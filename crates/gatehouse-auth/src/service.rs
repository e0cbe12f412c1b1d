//! Auth endpoint orchestrator.
//!
//! [`AuthService`] composes credential checks, the token issuer, the refresh
//! token store and the reset token service into the login, registration,
//! logout, validation, refresh and password flows. It never touches cookies;
//! the HTTP layer turns an [`IssuedSession`] into `Set-Cookie` headers.
//!
//! Every storage call is bounded by `storage_timeout`. A timeout is an
//! internal error and never falls back to an authenticated state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::AuthResult;
use crate::config::{AuthConfig, RegistrationConfig};
use crate::device::ClientContext;
use crate::error::AuthError;
use crate::mailer::{DisabledMailer, Mailer};
use crate::password::{Argon2PasswordHasher, PasswordHasher, validate_new_password};
use crate::refresh::RefreshTokenStore;
use crate::reset::PasswordResetService;
use crate::storage::{
    InMemoryAuthStorage, PasswordResetStorage, RefreshTokenStorage, UserStore, bounded,
};
use crate::token::TokenIssuer;
use crate::types::{NewUser, SessionUser, User, UserProfile, normalize_email};

/// External collaborators of the auth core.
#[derive(Clone)]
pub struct Collaborators {
    pub users: Arc<dyn UserStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStorage>,
    pub password_resets: Arc<dyn PasswordResetStorage>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub mailer: Arc<dyn Mailer>,
}

impl Collaborators {
    /// In-memory storage, Argon2id hashing and no mail delivery.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_storage(Arc::new(InMemoryAuthStorage::new()))
    }

    /// One backend for all three stores, Argon2id hashing, no mail delivery.
    pub fn from_storage<S>(storage: Arc<S>) -> Self
    where
        S: UserStore + RefreshTokenStorage + PasswordResetStorage + 'static,
    {
        Self {
            users: storage.clone(),
            refresh_tokens: storage.clone(),
            password_resets: storage,
            hasher: Arc::new(Argon2PasswordHasher::default()),
            mailer: Arc::new(DisabledMailer),
        }
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }
}

/// Token material for a freshly established or refreshed session.
///
/// Never serialized; the HTTP layer moves the tokens into cookies.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub access_token: String,
    /// `None` when a refresh left the existing token in place.
    pub refresh_token: Option<String>,
    pub profile: UserProfile,
}

/// Rows removed by one purge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub refresh_tokens: u64,
    pub reset_tokens: u64,
}

/// Registration input.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Orchestrates the auth flows.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    mailer: Arc<dyn Mailer>,
    issuer: TokenIssuer,
    refresh_tokens: RefreshTokenStore,
    resets: PasswordResetService,
    registration: RegistrationConfig,
    storage_timeout: Duration,
    /// Digest checked when the email is unknown, so both failures cost one verify.
    decoy_digest: OnceCell<String>,
}

impl AuthService {
    #[must_use]
    pub fn new(config: &AuthConfig, collaborators: Collaborators) -> Self {
        Self {
            issuer: TokenIssuer::from_config(config),
            refresh_tokens: RefreshTokenStore::new(
                collaborators.refresh_tokens,
                collaborators.users.clone(),
                config,
            ),
            resets: PasswordResetService::new(collaborators.password_resets, config),
            users: collaborators.users,
            hasher: collaborators.hasher,
            mailer: collaborators.mailer,
            registration: config.registration.clone(),
            storage_timeout: config.storage_timeout,
            decoy_digest: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }

    /// Verifies credentials and establishes a session.
    ///
    /// Unknown email and wrong password produce the same error.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientContext,
    ) -> AuthResult<IssuedSession> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::validation("Email and password are required"));
        }

        let email = normalize_email(email);
        let Some(user) = self.find_user_by_email(&email).await? else {
            debug!("login for unknown email");
            self.verify_against_decoy(password).await;
            return Err(AuthError::invalid_credentials());
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::invalid_credentials());
        }

        let session = self.issue_session(&user, client).await?;
        info!(user_id = %user.id, tenant_id = %user.tenant_id, "user logged in");
        Ok(session)
    }

    async fn verify_against_decoy(&self, password: &str) {
        let digest = self
            .decoy_digest
            .get_or_try_init(|| self.hasher.hash("gatehouse-decoy-password"))
            .await;
        match digest {
            Ok(digest) => {
                let _ = self.hasher.verify(password, digest).await;
            }
            Err(e) => warn!(error = %e, "could not prepare decoy password digest"),
        }
    }

    /// Creates an account with a fresh tenant and establishes a session.
    pub async fn register(
        &self,
        registration: Registration,
        client: &ClientContext,
    ) -> AuthResult<IssuedSession> {
        if !self.registration.enabled {
            return Err(AuthError::validation("Registration is disabled"));
        }

        let email = normalize_email(&registration.email);
        let name = registration.name.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::validation("A valid email is required"));
        }
        if name.is_empty() {
            return Err(AuthError::validation("Name is required"));
        }
        validate_new_password(&registration.password)?;

        let password_hash = self.hasher.hash(&registration.password).await?;
        let user = bounded(
            self.storage_timeout,
            "users.create",
            self.users.create(NewUser {
                tenant_id: Uuid::new_v4(),
                email,
                name: name.to_string(),
                password_hash,
                role: self.registration.default_role.clone(),
                is_demo: false,
            }),
        )
        .await?;

        let session = self.issue_session(&user, client).await?;
        info!(user_id = %user.id, tenant_id = %user.tenant_id, "user registered");
        Ok(session)
    }

    /// Revokes the presented refresh token. Best-effort: never fails.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let Some(raw) = refresh_token else {
            debug!("logout without refresh token");
            return;
        };
        match self.refresh_tokens.revoke_one(raw).await {
            Ok(()) => info!("refresh token revoked on logout"),
            Err(e) => warn!(error = %e, "failed to revoke refresh token on logout"),
        }
    }

    /// Verifies an access token and returns the identity it carries.
    pub fn validate(&self, access_token: Option<&str>) -> AuthResult<SessionUser> {
        let token = access_token.ok_or_else(|| AuthError::authentication("Authentication required"))?;
        let claims = self.issuer.verify(token).map_err(|e| {
            debug!(error = %e, "access token rejected");
            AuthError::from(e)
        })?;
        Ok(SessionUser::from(&claims))
    }

    /// Consumes a refresh token and mints a new access token.
    ///
    /// With rotation on a new refresh token is issued as well.
    pub async fn refresh(
        &self,
        refresh_token: Option<&str>,
        client: &ClientContext,
    ) -> AuthResult<IssuedSession> {
        let raw = refresh_token.ok_or_else(|| AuthError::authentication("Refresh token required"))?;

        let info = self.refresh_tokens.verify_and_consume(raw).await.map_err(|e| {
            debug!(error = %e, "refresh token rejected");
            AuthError::from(e)
        })?;

        let access_token = self.issuer.mint(&info.user, self.issuer.default_ttl())?;
        let refresh_token = if self.refresh_tokens.rotation_enabled() {
            Some(self.refresh_tokens.create(info.user.id, client).await?)
        } else {
            None
        };

        info!(user_id = %info.user.id, rotated = refresh_token.is_some(), "session refreshed");
        Ok(IssuedSession {
            access_token,
            refresh_token,
            profile: info.profile,
        })
    }

    /// Changes the password of a signed-in user.
    ///
    /// Every existing session of the user is revoked; the caller receives a
    /// new one.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        client: &ClientContext,
    ) -> AuthResult<IssuedSession> {
        let user = bounded(
            self.storage_timeout,
            "users.find_by_id",
            self.users.find_by_id(user_id),
        )
        .await?
        .ok_or_else(|| AuthError::authentication("Authentication required"))?;

        if !self.hasher.verify(current_password, &user.password_hash).await? {
            return Err(AuthError::invalid_credentials());
        }
        validate_new_password(new_password)?;

        self.set_password(&user.id, new_password).await?;
        let revoked = self.refresh_tokens.revoke_all_for_user(user.id).await?;
        self.resets.revoke_all_for_user(user.id).await?;

        let session = self.issue_session(&user, client).await?;
        info!(user_id = %user.id, revoked_sessions = revoked, "password changed");
        Ok(session)
    }

    /// Starts the forgot-password flow.
    ///
    /// Succeeds whether or not the email belongs to an account.
    pub async fn request_password_reset(
        &self,
        email: &str,
        client: &ClientContext,
    ) -> AuthResult<()> {
        let email = normalize_email(email);
        if email.is_empty() {
            debug!("password reset requested without email");
            return Ok(());
        }

        let Some(user) = self.find_user_by_email(&email).await? else {
            debug!("password reset requested for unknown email");
            return Ok(());
        };

        let raw = self.resets.issue(user.id, client).await?;
        let link = self.resets.reset_link(&raw)?;
        if let Err(e) = self.mailer.send_password_reset(&user.email, &link).await {
            error!(user_id = %user.id, error = %e, "failed to send password reset email");
        }

        info!(user_id = %user.id, "password reset requested");
        Ok(())
    }

    /// Completes the forgot-password flow. The token works once.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()> {
        if token.trim().is_empty() {
            return Err(AuthError::validation("Reset token is required"));
        }
        validate_new_password(new_password)?;

        let user_id = self.resets.consume(token.trim()).await.map_err(|e| {
            debug!(error = %e, "reset token rejected");
            AuthError::from(e)
        })?;

        self.set_password(&user_id, new_password).await?;
        self.resets.revoke_all_for_user(user_id).await?;
        let revoked = self.refresh_tokens.revoke_all_for_user(user_id).await?;

        info!(user_id = %user_id, revoked_sessions = revoked, "password reset completed");
        Ok(())
    }

    /// Deletes expired refresh and reset tokens.
    pub async fn purge_expired(&self) -> AuthResult<PurgeReport> {
        Ok(PurgeReport {
            refresh_tokens: self.refresh_tokens.purge_expired().await?,
            reset_tokens: self.resets.purge_expired().await?,
        })
    }

    async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        bounded(
            self.storage_timeout,
            "users.find_by_email",
            self.users.find_by_email(email),
        )
        .await
    }

    async fn set_password(&self, user_id: &Uuid, password: &str) -> AuthResult<()> {
        let hash = self.hasher.hash(password).await?;
        bounded(
            self.storage_timeout,
            "users.update_password",
            self.users.update_password(*user_id, &hash),
        )
        .await
    }

    async fn issue_session(&self, user: &User, client: &ClientContext) -> AuthResult<IssuedSession> {
        let access_token = self
            .issuer
            .mint(&SessionUser::from(user), self.issuer.default_ttl())?;
        let refresh_token = self.refresh_tokens.create(user.id, client).await?;
        Ok(IssuedSession {
            access_token,
            refresh_token: Some(refresh_token),
            profile: UserProfile::from(user),
        })
    }
}
