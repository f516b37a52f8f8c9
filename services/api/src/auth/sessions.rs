//! services/api/src/auth/sessions.rs
//!
//! Creates, validates and invalidates login sessions.

use crate::auth::cookies::{CookieAttributes, CookieSettings};
use crate::auth::tokens::random_token;
use crate::error::AppResult;
use chrono::Utc;
use cookstack_core::{AuthSession, CredentialStore, SessionPolicy, SessionStatus, User};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Result of resolving a session cookie.
#[derive(Debug, Clone)]
pub enum SessionValidation {
    Valid {
        session: AuthSession,
        user: User,
        /// The expiry was pushed forward; the cookie must be re-issued.
        refreshed: bool,
    },
    /// Unknown, expired or orphaned. The client cookie must be cleared.
    Invalid,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    policy: SessionPolicy,
    cookies: CookieSettings,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, policy: SessionPolicy, cookies: CookieSettings) -> Self {
        Self {
            store,
            policy,
            cookies,
        }
    }

    pub async fn create_session(&self, user_id: Uuid) -> AppResult<AuthSession> {
        let session = AuthSession {
            id: random_token(32),
            user_id,
            expires_at: self.policy.expiry_from(Utc::now()),
        };
        self.store.create_session(&session).await?;
        Ok(session)
    }

    pub async fn validate_session(&self, session_id: &str) -> AppResult<SessionValidation> {
        let Some(mut session) = self.store.find_session(session_id).await? else {
            return Ok(SessionValidation::Invalid);
        };

        let now = Utc::now();
        let refreshed = match self.policy.classify(&session, now) {
            SessionStatus::Expired => {
                debug!("Session for user {} expired", session.user_id);
                self.store.delete_session(&session.id).await?;
                return Ok(SessionValidation::Invalid);
            }
            SessionStatus::Fresh => {
                session.expires_at = self.policy.expiry_from(now);
                self.store.extend_session(&session.id, session.expires_at).await?;
                true
            }
            SessionStatus::Active => false,
        };

        match self.store.find_user_by_id(session.user_id).await? {
            Some(user) => Ok(SessionValidation::Valid {
                session,
                user,
                refreshed,
            }),
            None => {
                self.store.delete_session(&session.id).await?;
                Ok(SessionValidation::Invalid)
            }
        }
    }

    pub async fn invalidate_session(&self, session_id: &str) -> AppResult<()> {
        self.store.delete_session(session_id).await?;
        Ok(())
    }

    pub async fn invalidate_all_sessions(&self, user_id: Uuid) -> AppResult<()> {
        self.store.delete_user_sessions(user_id).await?;
        Ok(())
    }

    /// The cookie carrying `session`, valid for its remaining lifetime.
    pub fn session_cookie(&self, session: &AuthSession) -> CookieAttributes {
        let remaining = (session.expires_at - Utc::now()).num_seconds().max(0);
        self.cookies.session(&session.id, remaining)
    }

    pub fn blank_cookie(&self) -> CookieAttributes {
        self.cookies.blank_session()
    }
}
