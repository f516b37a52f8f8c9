//! services/api/src/web/pipeline.rs
//!
//! An explicit, ordered list of request interceptors per route group. Each
//! interceptor sees the shared `RequestContext` and either lets the request
//! continue or answers it. After the handler runs, the pipeline localizes
//! error bodies and sets the cookies interceptors asked for.

use crate::auth::cookies::CookieAttributes;
use crate::error::ErrorPayload;
use crate::web::context::RequestContext;
use crate::web::state::AppState;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use cookstack_core::Translator;
use std::sync::Arc;
use tracing::Span;

pub enum Flow {
    Continue,
    Respond(Response),
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, req: &mut Request, ctx: &mut RequestContext) -> Flow;
}

#[derive(Clone, Default)]
pub struct Pipeline {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }
}

/// State handed to `run_pipeline` through `middleware::from_fn_with_state`.
#[derive(Clone)]
pub struct PipelineState {
    pub app: Arc<AppState>,
    pub pipeline: Pipeline,
}

impl PipelineState {
    pub fn new(app: Arc<AppState>, pipeline: Pipeline) -> Self {
        Self { app, pipeline }
    }
}

pub async fn run_pipeline(
    State(stage): State<PipelineState>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut ctx = RequestContext::from_request(&req, &stage.app.config);
    if let Some(ip) = &ctx.anonymized_ip {
        Span::current().record("client_ip", ip.as_str());
    }

    for interceptor in &stage.pipeline.interceptors {
        if let Flow::Respond(response) = interceptor.intercept(&mut req, &mut ctx).await {
            return finish(stage.app.translator.as_ref(), &ctx, response);
        }
    }

    req.extensions_mut().insert(ctx.clone());
    let response = next.run(req).await;
    finish(stage.app.translator.as_ref(), &ctx, response)
}

fn finish(translator: &dyn Translator, ctx: &RequestContext, response: Response) -> Response {
    let mut response = localize(translator, &ctx.locale, response);
    append_cookies(&mut response, &ctx.cookies);
    response
}

/// Re-renders an error body with messages for `locale`.
fn localize(translator: &dyn Translator, locale: &str, response: Response) -> Response {
    let Some(payload) = response.extensions().get::<ErrorPayload>().cloned() else {
        return response;
    };

    let body = payload.to_json(|key| translator.translate(locale, key, &[]));
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    if let Ok(value) = HeaderValue::from_str(locale) {
        parts.headers.insert(header::CONTENT_LANGUAGE, value);
    }
    Response::from_parts(parts, Body::from(body.to_string()))
}

/// Adds each pending cookie unless the handler already set one with that name.
fn append_cookies(response: &mut Response, cookies: &[CookieAttributes]) {
    for cookie in cookies {
        let prefix = format!("{}=", cookie.name);
        let handled = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .any(|v| v.to_str().map(|v| v.starts_with(&prefix)).unwrap_or(false));
        if handled {
            continue;
        }
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
}
