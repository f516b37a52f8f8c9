//! services/api/src/web/middleware.rs
//!
//! The interceptors that make up the route-group pipelines.

use crate::auth::cookies::{read_cookie, SESSION_COOKIE};
use crate::auth::sessions::{SessionManager, SessionValidation};
use crate::error::AppError;
use crate::web::context::RequestContext;
use crate::web::pipeline::{Flow, Interceptor};
use crate::web::rate_limit::{RateLimiter, GLOBAL_KEY};
use async_trait::async_trait;
use axum::{extract::Request, response::IntoResponse};
use std::sync::Arc;
use tracing::{error, field, warn, Span};

/// Counts the request against the group's limiter; 429 once it is exhausted.
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Interceptor for RateLimit {
    async fn intercept(&self, _req: &mut Request, ctx: &mut RequestContext) -> Flow {
        let key = ctx
            .client_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| GLOBAL_KEY.to_string());

        match self.limiter.check(&key) {
            Ok(()) => Flow::Continue,
            Err(retry_after) => {
                warn!(
                    limiter = self.limiter.name(),
                    client = ctx.anonymized_ip.as_deref().unwrap_or(GLOBAL_KEY),
                    "Rate limit exceeded"
                );
                Flow::Respond(AppError::RateLimited { retry_after }.into_response())
            }
        }
    }
}

/// Resolves the session cookie into a user. A stale cookie is cleared and a
/// session past half its lifetime has its cookie re-issued.
pub struct ResolveSession {
    sessions: SessionManager,
}

impl ResolveSession {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Interceptor for ResolveSession {
    async fn intercept(&self, req: &mut Request, ctx: &mut RequestContext) -> Flow {
        let Some(session_id) = read_cookie(req.headers(), SESSION_COOKIE) else {
            return Flow::Continue;
        };

        match self.sessions.validate_session(&session_id).await {
            Ok(SessionValidation::Valid {
                session,
                user,
                refreshed,
            }) => {
                if refreshed {
                    ctx.cookies.push(self.sessions.session_cookie(&session));
                }
                Span::current().record("user_id", field::display(user.id));
                ctx.user = Some(user);
                ctx.session = Some(session);
                Flow::Continue
            }
            Ok(SessionValidation::Invalid) => {
                ctx.cookies.push(self.sessions.blank_cookie());
                Flow::Continue
            }
            Err(e) => {
                error!("Failed to resolve session: {}", e);
                Flow::Respond(e.into_response())
            }
        }
    }
}

/// Answers 401 unless a session was resolved.
pub struct RequireSession;

#[async_trait]
impl Interceptor for RequireSession {
    async fn intercept(&self, _req: &mut Request, ctx: &mut RequestContext) -> Flow {
        if ctx.user.is_some() {
            Flow::Continue
        } else {
            Flow::Respond(AppError::Unauthorized.into_response())
        }
    }
}
