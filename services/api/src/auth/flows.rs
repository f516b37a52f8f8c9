//! services/api/src/auth/flows.rs
//!
//! The authentication flows: sign-up, password sign-in, email verification,
//! password reset and change, and Google sign-in.
//!
//! `AuthFlows` is built per request from the shared state and the request's
//! locale; it holds no state of its own.

use crate::auth::tokens::{constant_time_eq, numeric_code, random_token, sha256_hex};
use crate::error::{AppError, AppResult};
use crate::web::state::AppState;
use chrono::{Duration, Utc};
use cookstack_core::domain::ProfileUpdate;
use cookstack_core::{
    AuthSession, EmailVerificationCode, OAuthAccount, OAuthProfile, OAuthProvider,
    PasswordResetToken, PortResult, User,
};
use tracing::{info, warn};
use url::Url;

pub const VERIFICATION_CODE_LENGTH: usize = 8;
pub const VERIFICATION_CODE_TTL_MINUTES: i64 = 15;
pub const RESET_TOKEN_TTL_HOURS: i64 = 2;

/// A user together with the session just issued for them.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub session: AuthSession,
}

/// What the first OAuth step hands back to the client.
#[derive(Debug, Clone)]
pub struct OAuthStart {
    pub authorization_url: String,
    pub state: String,
    pub code_verifier: String,
    pub redirect: Option<String>,
}

/// Values the OAuth callback receives from the query string and the cookies
/// set by the first step.
#[derive(Debug, Clone, Default)]
pub struct OAuthCallback {
    pub state: Option<String>,
    pub code: Option<String>,
    pub cookie_state: Option<String>,
    pub cookie_verifier: Option<String>,
    pub cookie_redirect: Option<String>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct AuthFlows<'a> {
    state: &'a AppState,
    locale: &'a str,
}

impl<'a> AuthFlows<'a> {
    pub fn new(state: &'a AppState, locale: &'a str) -> Self {
        Self { state, locale }
    }

    fn text(&self, key: &str, params: &[(&str, &str)]) -> String {
        self.state.translator.translate(self.locale, key, params)
    }

    async fn issue_session(&self, user: User) -> AppResult<SignedIn> {
        let session = self.state.sessions.create_session(user.id).await?;
        Ok(SignedIn { user, session })
    }

    //=====================================================================================
    // Password Accounts
    //=====================================================================================

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> AppResult<SignedIn> {
        let email = normalize_email(email);
        let credentials = &self.state.credentials;

        if credentials.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::EmailInUse);
        }

        let hashed_password = self.state.passwords.hash(password)?;
        let user = User::new(email, name, Some(hashed_password));
        let code = self.new_verification_code(&user);

        // A concurrent sign-up with the same email loses on the unique index.
        credentials
            .create_user_with_verification(&user, &code)
            .await
            .map_err(|e| match e {
                e if e.is_unique_violation() => AppError::EmailInUse,
                e => e.into(),
            })?;
        info!(user_id = %user.id, "User signed up");

        self.send_verification_code(&code).await;
        self.issue_session(user).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<SignedIn> {
        let email = normalize_email(email);
        let user = self
            .state
            .credentials
            .find_user_by_email(&email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        let stored_hash = user
            .hashed_password
            .as_deref()
            .ok_or(AppError::InvalidCredentials)?;

        if !self.state.passwords.verify(password, stored_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        info!(user_id = %user.id, "User signed in");
        self.issue_session(user).await
    }

    /// Replaces the password of a signed-in user and rotates every session.
    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<SignedIn> {
        let stored_hash = user
            .hashed_password
            .as_deref()
            .ok_or(AppError::BadRequest("noPassword"))?;
        if !self.state.passwords.verify(current_password, stored_hash)? {
            return Err(AppError::field("currentPassword", "invalidCredentials"));
        }

        let hashed_password = self.state.passwords.hash(new_password)?;
        let user = self
            .state
            .credentials
            .reset_password(user.id, &hashed_password)
            .await?;
        info!(user_id = %user.id, "Password changed, sessions revoked");
        self.issue_session(user).await
    }

    //=====================================================================================
    // Email Verification
    //=====================================================================================

    fn new_verification_code(&self, user: &User) -> EmailVerificationCode {
        EmailVerificationCode {
            user_id: user.id,
            email: user.email.clone(),
            code: numeric_code(VERIFICATION_CODE_LENGTH),
            expires_at: Utc::now() + Duration::minutes(VERIFICATION_CODE_TTL_MINUTES),
        }
    }

    async fn send_verification_code(&self, code: &EmailVerificationCode) {
        let subject = self.text("verifyEmailSubject", &[]);
        let html = self.text("verifyEmailBody", &[("code", &code.code)]);
        if !self.state.mailer.send(&code.email, &subject, &html).await {
            warn!(user_id = %code.user_id, "Verification email was not delivered");
        }
    }

    /// Sends a new code unless one is still outstanding.
    pub async fn resend_verification(&self, user: &User) -> AppResult<()> {
        if user.email_verified {
            return Err(AppError::AlreadyVerified);
        }

        let credentials = &self.state.credentials;
        if let Some(existing) = credentials.find_verification_code(user.id).await? {
            if !existing.is_expired(Utc::now()) {
                return Err(AppError::VerificationCooldown);
            }
        }

        let code = self.new_verification_code(user);
        credentials.replace_verification_code(&code).await?;
        self.send_verification_code(&code).await;
        Ok(())
    }

    /// Checks `code`, marks the user verified and replaces every session of
    /// the user with a new one.
    pub async fn verify_email(&self, user: &User, code: &str) -> AppResult<SignedIn> {
        if user.email_verified {
            return Err(AppError::AlreadyVerified);
        }

        let credentials = &self.state.credentials;
        let stored = credentials
            .find_verification_code(user.id)
            .await?
            .ok_or(AppError::InvalidCode)?;
        let matches = stored.email == user.email && constant_time_eq(&stored.code, code.trim());
        if !matches || stored.is_expired(Utc::now()) {
            return Err(AppError::InvalidCode);
        }

        let user = credentials.complete_email_verification(user.id).await?;
        info!(user_id = %user.id, "Email verified, sessions revoked");
        self.issue_session(user).await
    }

    //=====================================================================================
    // Password Reset
    //=====================================================================================

    /// Sends a reset link when the account can use one. Callers answer the
    /// same way whether or not anything was sent.
    pub async fn request_password_reset(&self, email: &str, redirect: Option<&str>) -> AppResult<()> {
        let email = normalize_email(email);
        let Some(user) = self.state.credentials.find_user_by_email(&email).await? else {
            return Ok(());
        };
        if user.hashed_password.is_none() || !user.email_verified {
            return Ok(());
        }

        let token = random_token(32);
        self.state
            .credentials
            .replace_password_reset_token(&PasswordResetToken {
                token_hash: sha256_hex(&token),
                user_id: user.id,
                expires_at: Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS),
            })
            .await?;

        let mut link = self.state.redirects.resolve(redirect, "/reset-password");
        link.query_pairs_mut().append_pair("token", &token);

        let subject = self.text("resetPasswordSubject", &[]);
        let html = self.text("resetPasswordBody", &[("link", link.as_str())]);
        if !self.state.mailer.send(&user.email, &subject, &html).await {
            warn!(user_id = %user.id, "Password reset email was not delivered");
        }
        Ok(())
    }

    /// Consumes `token`. The token row is gone after this call whatever the outcome.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<SignedIn> {
        let credentials = &self.state.credentials;
        let stored = credentials
            .take_password_reset_token(&sha256_hex(token))
            .await?
            .ok_or(AppError::InvalidToken)?;
        if stored.is_expired(Utc::now()) {
            return Err(AppError::InvalidToken);
        }

        let hashed_password = self.state.passwords.hash(new_password)?;
        let user = credentials.reset_password(stored.user_id, &hashed_password).await?;
        info!(user_id = %user.id, "Password reset, sessions revoked");
        self.issue_session(user).await
    }

    //=====================================================================================
    // OAuth
    //=====================================================================================

    pub fn begin_oauth(&self, provider: &dyn OAuthProvider, redirect: Option<&str>) -> OAuthStart {
        let state = random_token(32);
        let code_verifier = random_token(32);
        OAuthStart {
            authorization_url: provider.authorization_url(&state, &code_verifier),
            redirect: self
                .state
                .redirects
                .validate(redirect)
                .map(String::from),
            state,
            code_verifier,
        }
    }

    /// Finishes the provider round trip. Returns the signed-in user and where
    /// to send the browser next.
    pub async fn complete_oauth(
        &self,
        provider: &dyn OAuthProvider,
        callback: OAuthCallback,
    ) -> AppResult<(SignedIn, Url)> {
        let (Some(state), Some(code), Some(cookie_state), Some(verifier)) = (
            callback.state,
            callback.code,
            callback.cookie_state,
            callback.cookie_verifier,
        ) else {
            return Err(AppError::OAuthStateMismatch);
        };
        if !constant_time_eq(&state, &cookie_state) {
            return Err(AppError::OAuthStateMismatch);
        }

        let tokens = provider
            .exchange_code(&code, &verifier)
            .await
            .map_err(|e| AppError::ProviderError(e.to_string()))?;
        let mut profile = provider
            .fetch_profile(&tokens)
            .await
            .map_err(|e| AppError::ProviderError(e.to_string()))?;
        if !profile.email_verified {
            return Err(AppError::UnverifiedProviderEmail);
        }
        profile.email = normalize_email(&profile.email);

        let user = match self.find_or_create_oauth_user(provider.provider_id(), &profile).await {
            Err(e) if e.is_unique_violation() => {
                // Lost a race with a concurrent callback for the same account.
                self.find_or_create_oauth_user(provider.provider_id(), &profile)
                    .await?
            }
            other => other?,
        };
        info!(user_id = %user.id, provider = provider.provider_id(), "User signed in with OAuth");

        let destination = self
            .state
            .redirects
            .resolve(callback.cookie_redirect.as_deref(), "/");
        Ok((self.issue_session(user).await?, destination))
    }

    async fn find_or_create_oauth_user(
        &self,
        provider_id: &str,
        profile: &OAuthProfile,
    ) -> PortResult<User> {
        let credentials = &self.state.credentials;
        if let Some(user) = credentials
            .find_oauth_user(provider_id, &profile.provider_user_id)
            .await?
        {
            return Ok(user);
        }

        let link_to = |user_id| OAuthAccount {
            provider_id: provider_id.to_string(),
            provider_user_id: profile.provider_user_id.clone(),
            user_id,
        };

        match credentials.find_user_by_email(&profile.email).await? {
            Some(existing) => {
                let backfill = ProfileUpdate {
                    name: profile.name.clone(),
                    image_url: profile.picture.clone(),
                };
                credentials
                    .link_oauth_account(&link_to(existing.id), &backfill, profile.email_verified)
                    .await
            }
            None => {
                let mut user = User::new(profile.email.clone(), profile.name.clone(), None);
                user.image_url = profile.picture.clone();
                user.email_verified = profile.email_verified;
                credentials.create_oauth_user(&user, &link_to(user.id)).await?;
                Ok(user)
            }
        }
    }
}

