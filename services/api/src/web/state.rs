//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::auth::cookies::CookieSettings;
use crate::auth::password::PasswordService;
use crate::auth::redirect::RedirectPolicy;
use crate::auth::sessions::SessionManager;
use crate::config::{Config, ConfigError};
use crate::web::rate_limit::RateLimiter;
use cookstack_core::{
    ContentStore, CredentialStore, ImageStore, Mailer, OAuthProvider, ResponseCache,
    SessionPolicy, Translator,
};
use std::sync::Arc;
use std::time::Duration;

/// The external collaborators the service is wired to.
#[derive(Clone)]
pub struct Adapters {
    pub credentials: Arc<dyn CredentialStore>,
    pub content: Arc<dyn ContentStore>,
    pub mailer: Arc<dyn Mailer>,
    pub images: Arc<dyn ImageStore>,
    pub google: Option<Arc<dyn OAuthProvider>>,
    pub cache: Arc<dyn ResponseCache>,
    pub translator: Arc<dyn Translator>,
}

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// Nothing in here is mutated per request; per-request data lives in the
/// `RequestContext`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: Arc<dyn CredentialStore>,
    pub content: Arc<dyn ContentStore>,
    pub mailer: Arc<dyn Mailer>,
    pub images: Arc<dyn ImageStore>,
    pub google: Option<Arc<dyn OAuthProvider>>,
    pub cache: Arc<dyn ResponseCache>,
    pub translator: Arc<dyn Translator>,
    pub passwords: PasswordService,
    pub sessions: SessionManager,
    pub cookies: CookieSettings,
    pub redirects: RedirectPolicy,
    pub auth_limiter: Arc<RateLimiter>,
    pub api_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, adapters: Adapters) -> Result<Self, ConfigError> {
        let passwords =
            PasswordService::new(config.password_pepper.clone(), config.password_cost)?;
        let cookies = CookieSettings::from_config(&config);
        let sessions = SessionManager::new(
            adapters.credentials.clone(),
            SessionPolicy::default(),
            cookies.clone(),
        );
        let redirects = RedirectPolicy::new(
            config.app_url.clone(),
            config.allowed_redirect_hosts.clone(),
            config.cookie_domain.clone(),
        );
        let window = Duration::from_secs(config.rate_limits.window_secs);
        let auth_limiter = Arc::new(RateLimiter::new("auth", config.rate_limits.auth_max, window));
        let api_limiter = Arc::new(RateLimiter::new("api", config.rate_limits.api_max, window));

        Ok(Self {
            config: Arc::new(config),
            credentials: adapters.credentials,
            content: adapters.content,
            mailer: adapters.mailer,
            images: adapters.images,
            google: adapters.google,
            cache: adapters.cache,
            translator: adapters.translator,
            passwords,
            sessions,
            cookies,
            redirects,
            auth_limiter,
            api_limiter,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.config.cache_ttl_secs)
    }
}
