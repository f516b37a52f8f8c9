//! services/api/src/web/cache.rs
//!
//! Read-through response caching for the public content routes.
//!
//! GET responses are keyed by path, query and resolved locale. Only 2xx
//! responses are stored, and the store happens in the background after the
//! response is already on its way. A successful mutation through the same
//! routes empties the cache and starts a new cache generation; a store tagged
//! with an earlier generation is discarded.

use crate::error::AppError;
use crate::web::context::RequestContext;
use crate::web::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cookstack_core::ports::CachedResponse;
use std::sync::Arc;
use tracing::{debug, error};

pub const X_CACHE: &str = "x-cache";

pub fn cache_key(uri: &Uri, locale: &str) -> String {
    match uri.query() {
        Some(query) => format!("{}?{}#{}", uri.path(), query, locale),
        None => format!("{}#{}", uri.path(), locale),
    }
}

pub async fn response_cache(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::GET {
        let response = next.run(req).await;
        if response.status().is_success() {
            state.cache.clear().await;
            debug!("Response cache cleared after a mutation");
        }
        return response;
    }

    let locale = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.locale.clone())
        .unwrap_or_else(|| state.config.default_locale.clone());
    let key = cache_key(req.uri(), &locale);
    let max_age = state.config.cache_ttl_secs;

    if let Some(hit) = state.cache.get(&key).await {
        return replay(hit, max_age);
    }

    // Taken before the handler reads, so a clear racing the render wins.
    let generation = state.cache.generation().await;
    let response = next.run(req).await;
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to buffer response for caching: {}", e);
            return AppError::Internal(e.to_string()).into_response();
        }
    };

    let snapshot = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter(|(name, _)| *name != header::SET_COOKIE)
            .filter_map(|(name, value)| {
                Some((name.to_string(), value.to_str().ok()?.to_string()))
            })
            .collect(),
        body: bytes.to_vec(),
    };
    let cache = state.cache.clone();
    let ttl = state.cache_ttl();
    tokio::spawn(async move {
        cache.put(&key, snapshot, ttl, generation).await;
    });

    mark(&mut parts.headers, max_age, "MISS");
    Response::from_parts(parts, Body::from(bytes))
}

fn replay(hit: CachedResponse, max_age: u64) -> Response {
    let mut response = Response::new(Body::from(hit.body));
    *response.status_mut() = StatusCode::from_u16(hit.status).unwrap_or(StatusCode::OK);
    for (name, value) in hit.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            response.headers_mut().append(name, value);
        }
    }
    mark(response.headers_mut(), max_age, "HIT");
    response
}

fn mark(headers: &mut HeaderMap, max_age: u64, outcome: &'static str) {
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", max_age)) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    headers.insert(header::VARY, HeaderValue::from_static("Accept-Language"));
    headers.insert(X_CACHE, HeaderValue::from_static(outcome));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_includes_query_and_locale() {
        let uri: Uri = "/api/recipes?page=2".parse().unwrap();
        assert_eq!(cache_key(&uri, "fr"), "/api/recipes?page=2#fr");
        let uri: Uri = "/api/categories".parse().unwrap();
        assert_ne!(cache_key(&uri, "fr"), cache_key(&uri, "en"));
    }

    #[test]
    fn replay_restores_status_headers_and_marks_the_hit() {
        let response = replay(
            CachedResponse {
                status: 200,
                headers: vec![("content-type".into(), "application/json".into())],
                body: b"[]".to_vec(),
            },
            60,
        );
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=60");
        assert_eq!(response.headers()[header::VARY], "Accept-Language");
        assert_eq!(response.headers()[X_CACHE], "HIT");
    }
}
