//! services/api/src/web/router.rs
//!
//! Wires every route group to its interceptor pipeline.
//!
//! | group    | limiter | session  | cache |
//! |----------|---------|----------|-------|
//! | auth     | auth    | resolved | no    |
//! | session  | auth    | required | no    |
//! | account  | api     | required | no    |
//! | content  | api     | resolved | yes   |
//!
//! `/health` sits outside every group.

use crate::config::Config;
use crate::web::cache::response_cache;
use crate::web::collections::{self, Ingredients, Instructions, Sections};
use crate::web::middleware::{RateLimit, RequireSession, ResolveSession};
use crate::web::pipeline::{run_pipeline, Pipeline, PipelineState};
use crate::web::state::AppState;
use crate::web::{auth, categories, recipes, rest, role_requests, users};
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE},
        HeaderValue, Method, Request,
    },
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{field, info_span, Span};

pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

fn make_span(request: &Request<Body>) -> Span {
    info_span!(
        "http-request",
        method = %request.method(),
        path = request.uri().path(),
        user_id = field::Empty,
        client_ip = field::Empty,
    )
}

fn cors(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT, ACCEPT_LANGUAGE]);
    match HeaderValue::from_str(&config.app_url.origin().ascii_serialization()) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => layer,
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let pipeline = |stages: Pipeline| {
        middleware::from_fn_with_state(PipelineState::new(state.clone(), stages), run_pipeline)
    };

    let auth_pipeline = Pipeline::new()
        .then(RateLimit::new(state.auth_limiter.clone()))
        .then(ResolveSession::new(state.sessions.clone()));
    let session_pipeline = auth_pipeline.clone().then(RequireSession);
    let account_pipeline = Pipeline::new()
        .then(RateLimit::new(state.api_limiter.clone()))
        .then(ResolveSession::new(state.sessions.clone()))
        .then(RequireSession);
    let content_pipeline = Pipeline::new()
        .then(RateLimit::new(state.api_limiter.clone()))
        .then(ResolveSession::new(state.sessions.clone()));

    let auth_routes = Router::new()
        .route("/api/auth/signup", post(auth::sign_up))
        .route("/api/auth/signin", post(auth::sign_in))
        .route("/api/auth/reset-password", post(auth::request_password_reset))
        .route("/api/auth/reset-password/{token}", post(auth::reset_password))
        .route("/api/auth/signin/google", get(auth::google_start))
        .route("/api/auth/signin/google/callback", get(auth::google_callback))
        .layer(pipeline(auth_pipeline));

    let session_routes = Router::new()
        .route("/api/auth/signout", post(auth::sign_out))
        .route("/api/auth/signout/all", post(auth::sign_out_all))
        .route("/api/auth/password", post(auth::change_password))
        .route("/api/auth/verify-email", post(auth::resend_verification))
        .route("/api/auth/verify-email/{code}", post(auth::verify_email))
        .layer(pipeline(session_pipeline));

    let account_routes = Router::new()
        .route("/api/users/me", get(users::me).patch(users::update_me))
        .route(
            "/api/role-requests",
            get(role_requests::list_pending).post(role_requests::create),
        )
        .route("/api/role-requests/{id}/approve", post(role_requests::approve))
        .route("/api/role-requests/{id}/reject", post(role_requests::reject))
        .layer(pipeline(account_pipeline));

    let content_routes = Router::new()
        .route("/api/categories", get(categories::list).post(categories::create))
        .route(
            "/api/categories/{id}",
            patch(categories::rename).delete(categories::delete),
        )
        .route("/api/recipes", get(recipes::list).post(recipes::create))
        .route(
            "/api/recipes/{recipe_id}",
            get(recipes::detail)
                .patch(recipes::update)
                .delete(recipes::delete),
        )
        .route("/api/recipes/{recipe_id}/image", put(recipes::upload_image))
        .route(
            "/api/recipes/{recipe_id}/sections",
            get(collections::list::<Sections>)
                .put(collections::replace::<Sections>)
                .post(collections::append::<Sections>),
        )
        .route(
            "/api/recipes/{recipe_id}/sections/{section_id}",
            delete(collections::remove::<Sections>),
        )
        .route(
            "/api/recipes/{recipe_id}/sections/{section_id}/ingredients",
            get(collections::list::<Ingredients>)
                .put(collections::replace::<Ingredients>)
                .post(collections::append::<Ingredients>),
        )
        .route(
            "/api/recipes/{recipe_id}/sections/{section_id}/ingredients/{id}",
            delete(collections::remove::<Ingredients>),
        )
        .route(
            "/api/recipes/{recipe_id}/sections/{section_id}/instructions",
            get(collections::list::<Instructions>)
                .put(collections::replace::<Instructions>)
                .post(collections::append::<Instructions>),
        )
        .route(
            "/api/recipes/{recipe_id}/sections/{section_id}/instructions/{id}",
            delete(collections::remove::<Instructions>),
        )
        // The cache runs inside the pipeline so it sees the resolved locale
        // and never stores the pipeline's cookies.
        .layer(middleware::from_fn_with_state(state.clone(), response_cache))
        .layer(pipeline(content_pipeline));

    Router::new()
        .merge(auth_routes)
        .merge(session_routes)
        .merge(account_routes)
        .merge(content_routes)
        .route("/health", get(rest::health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(cors(&state.config))
        .with_state(state)
}
