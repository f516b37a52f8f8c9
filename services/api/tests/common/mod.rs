//! Shared harness for the HTTP integration tests: a router over an in-memory
//! SQLite database, a mailer that records what it was asked to send and a
//! scripted OAuth provider.

#![allow(dead_code)]

use api_lib::adapters::{Catalog, DbAdapter, DiskImageStore, MemoryCache};
use api_lib::config::{Config, PasswordCost, RateLimitSettings};
use api_lib::web::build_router;
use api_lib::web::state::{Adapters, AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use cookstack_core::ports::OAuthTokens;
use cookstack_core::{Mailer, OAuthProfile, OAuthProvider, PortError, PortResult, Role};
use secrecy::SecretString;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tracing::Level;
use url::Url;
use uuid::Uuid;

pub const PASSWORD: &str = "correct horse battery";

//=========================================================================================
// Test Doubles
//=========================================================================================

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn sent_to(&self, to: &str) -> Vec<SentMail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|mail| mail.to == to)
            .cloned()
            .collect()
    }

    fn last_to(&self, to: &str) -> Option<SentMail> {
        self.sent_to(to).pop()
    }

    /// The code from the latest verification email to `to`.
    pub fn verification_code(&self, to: &str) -> Option<String> {
        let html = self.last_to(to)?.html;
        let start = html.find("<strong>")? + "<strong>".len();
        let end = html[start..].find("</strong>")? + start;
        Some(html[start..end].to_string())
    }

    /// The token from the latest reset link sent to `to`.
    pub fn reset_token(&self, to: &str) -> Option<String> {
        let html = self.last_to(to)?.html;
        let start = html.find("token=")? + "token=".len();
        let end = html[start..].find('"')? + start;
        Some(html[start..end].to_string())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> bool {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        true
    }
}

/// Answers the code exchange for `GOOD_CODE` only and hands back `profile`.
pub struct FakeOAuthProvider {
    pub profile: OAuthProfile,
}

impl FakeOAuthProvider {
    pub const GOOD_CODE: &'static str = "good-code";

    pub fn new(email: &str, email_verified: bool) -> Self {
        Self {
            profile: OAuthProfile {
                provider_user_id: format!("google-{}", email),
                email: email.to_string(),
                email_verified,
                name: Some("Google Cook".to_string()),
                picture: Some("https://images.test/avatar.png".to_string()),
            },
        }
    }
}

#[async_trait]
impl OAuthProvider for FakeOAuthProvider {
    fn provider_id(&self) -> &str {
        "google"
    }

    fn authorization_url(&self, state: &str, code_verifier: &str) -> String {
        format!(
            "https://accounts.test/auth?state={}&code_challenge_method=S256&verifier_len={}",
            state,
            code_verifier.len()
        )
    }

    async fn exchange_code(&self, code: &str, _code_verifier: &str) -> PortResult<OAuthTokens> {
        if code == Self::GOOD_CODE {
            Ok(OAuthTokens {
                access_token: "access".to_string(),
                id_token: None,
            })
        } else {
            Err(PortError::Unexpected("google: invalid_grant".to_string()))
        }
    }

    async fn fetch_profile(&self, _tokens: &OAuthTokens) -> PortResult<OAuthProfile> {
        Ok(self.profile.clone())
    }
}

//=========================================================================================
// The Application Under Test
//=========================================================================================

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        log_level: Level::DEBUG,
        production: false,
        app_url: Url::parse("http://localhost:3000").unwrap(),
        cookie_domain: None,
        password_pepper: SecretString::from("test-pepper".to_string()),
        password_cost: PasswordCost {
            memory_kib: 1024,
            iterations: 1,
        },
        google: None,
        resend_api_key: None,
        mail_from: "CookStack <noreply@cookstack.test>".to_string(),
        allowed_redirect_hosts: vec!["app.cookstack.test".to_string()],
        rate_limits: RateLimitSettings {
            auth_max: 1_000,
            api_max: 1_000,
            window_secs: 60,
        },
        cache_ttl_secs: 60,
        image_dir: std::env::temp_dir().join(format!("cookstack-test-{}", Uuid::new_v4())),
        image_base_url: "http://cdn.test/images".to_string(),
        supported_locales: vec!["en".to_string(), "fr".to_string()],
        default_locale: "en".to_string(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub mailer: Arc<RecordingMailer>,
    pub db: DbAdapter,
    /// The same in-memory database as `db`, for rows no endpoint can produce.
    pub pool: SqlitePool,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config(), None).await
    }

    pub async fn spawn_with(config: Config, google: Option<Arc<dyn OAuthProvider>>) -> Self {
        // One connection that never recycles, or the in-memory database is lost.
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .unwrap();
        let db = DbAdapter::new(pool.clone());
        db.run_migrations().await.unwrap();
        let mailer = Arc::new(RecordingMailer::default());

        let adapters = Adapters {
            credentials: Arc::new(db.clone()),
            content: Arc::new(db.clone()),
            mailer: mailer.clone(),
            images: Arc::new(DiskImageStore::new(
                config.image_dir.clone(),
                config.image_base_url.clone(),
            )),
            google,
            cache: Arc::new(MemoryCache::new()),
            translator: Arc::new(Catalog::builtin()),
        };
        let state = Arc::new(AppState::new(config, adapters).unwrap());

        Self {
            router: build_router(state.clone()),
            state,
            mailer,
            db,
            pool,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        session: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        self.send(json_request(method, uri, session, body)).await
    }

    //=====================================================================================
    // Account Helpers
    //=====================================================================================

    /// Signs up and returns the new user's id and session cookie value.
    pub async fn sign_up(&self, email: &str) -> (Uuid, String) {
        let response = self
            .json(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let session = cookie_value(&response, "session").unwrap();
        let body = body_json(response).await;
        let id = body["user"]["id"].as_str().unwrap().parse().unwrap();
        (id, session)
    }

    pub async fn sign_in(&self, email: &str) -> String {
        let response = self
            .json(
                Method::POST,
                "/api/auth/signin",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        cookie_value(&response, "session").unwrap()
    }

    /// Signs up and verifies the email. Returns the id and the post-verification session.
    pub async fn verified_user(&self, email: &str) -> (Uuid, String) {
        let (id, session) = self.sign_up(email).await;
        let code = self.mailer.verification_code(email).unwrap();
        let response = self
            .json(
                Method::POST,
                &format!("/api/auth/verify-email/{}", code),
                Some(&session),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        (id, cookie_value(&response, "session").unwrap())
    }

    /// A verified user holding `role`, with a fresh session.
    pub async fn user_with_role(&self, email: &str, role: Role) -> (Uuid, String) {
        let (id, _) = self.verified_user(email).await;
        sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .unwrap();
        (id, self.sign_in(email).await)
    }

    /// How many rows of `table` belong to `user_id`.
    pub async fn count_rows(&self, table: &str, user_id: Uuid) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {} WHERE user_id = ?", table))
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    //=====================================================================================
    // Content Helpers
    //=====================================================================================

    pub async fn create_category(&self, session: &str, name: &str) -> Uuid {
        let response = self
            .json(
                Method::POST,
                "/api/categories",
                Some(session),
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        id_of(body_json(response).await)
    }

    pub async fn create_recipe(&self, session: &str, category_id: Uuid, title: &str) -> Uuid {
        let response = self
            .json(
                Method::POST,
                "/api/recipes",
                Some(session),
                Some(json!({ "categoryId": category_id, "title": title })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        id_of(body_json(response).await)
    }
}

//=========================================================================================
// Request/Response Helpers
//=========================================================================================

pub fn json_request(
    method: Method,
    uri: &str,
    session: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(session) = session {
        builder = builder.header(header::COOKIE, format!("session={}", session));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// The value a `Set-Cookie` header of the response gives `name`.
pub fn cookie_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| {
            let pair = v.split(';').next()?;
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

pub fn id_of(body: Value) -> Uuid {
    body["id"].as_str().unwrap().parse().unwrap()
}
