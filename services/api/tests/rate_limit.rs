mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{test_config, TestApp};
use serde_json::json;

fn sign_in_from(ip: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/auth/signin")
        .header("x-forwarded-for", ip)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "nobody@cookstack.test", "password": "wrong password" }).to_string(),
        ))
        .unwrap()
}

fn categories_from(ip: &str) -> Request<Body> {
    Request::builder()
        .uri("/api/categories")
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn auth_routes_are_limited_per_client() {
    let mut config = test_config();
    config.rate_limits.auth_max = 2;
    let app = TestApp::spawn_with(config, None).await;

    for _ in 0..2 {
        let response = app.send(sign_in_from("203.0.113.7")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app.send(sign_in_from("203.0.113.7")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    let response = app.send(sign_in_from("198.51.100.20")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn groups_count_against_separate_limiters() {
    let mut config = test_config();
    config.rate_limits.auth_max = 1;
    config.rate_limits.api_max = 2;
    let app = TestApp::spawn_with(config, None).await;

    app.send(sign_in_from("203.0.113.7")).await;
    let response = app.send(sign_in_from("203.0.113.7")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    for _ in 0..2 {
        let response = app.send(categories_from("203.0.113.7")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.send(categories_from("203.0.113.7")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn health_is_never_limited() {
    let mut config = test_config();
    config.rate_limits.auth_max = 1;
    config.rate_limits.api_max = 1;
    let app = TestApp::spawn_with(config, None).await;

    for _ in 0..3 {
        let response = app
            .send(
                Request::builder()
                    .uri("/health")
                    .header("x-forwarded-for", "203.0.113.7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
