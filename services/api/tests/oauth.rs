mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use common::{body_json, cookie_value, test_config, FakeOAuthProvider, TestApp};
use cookstack_core::OAuthProvider;
use std::sync::Arc;

const OAUTH_COOKIES: [&str; 3] = [
    "google_oauth_state",
    "google_oauth_code",
    "google_oauth_redirect",
];

async fn with_google(email: &str, verified: bool) -> TestApp {
    let provider: Arc<dyn OAuthProvider> = Arc::new(FakeOAuthProvider::new(email, verified));
    TestApp::spawn_with(test_config(), Some(provider)).await
}

fn get(uri: &str, cookies: Option<String>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::empty()).unwrap()
}

/// Runs the start step and returns the `state` value and the cookies to send back.
async fn start(app: &TestApp, query: &str) -> (String, String) {
    let response = app
        .send(get(&format!("/api/auth/signin/google{}", query), None))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let state = cookie_value(&response, "google_oauth_state").unwrap();
    let cookies = OAUTH_COOKIES
        .iter()
        .filter_map(|name| {
            let value = cookie_value(&response, name)?;
            (!value.is_empty()).then(|| format!("{}={}", name, value))
        })
        .collect::<Vec<_>>()
        .join("; ");
    (state, cookies)
}

async fn callback(app: &TestApp, state: &str, code: &str, cookies: String) -> Response {
    let uri = format!(
        "/api/auth/signin/google/callback?state={}&code={}",
        state, code
    );
    app.send(get(&uri, Some(cookies))).await
}

fn assert_oauth_cookies_cleared(response: &Response) {
    for name in OAUTH_COOKIES {
        assert_eq!(cookie_value(response, name).as_deref(), Some(""), "{}", name);
    }
}

#[tokio::test]
async fn start_redirects_to_the_provider_with_transient_cookies() {
    let app = with_google("cook@gmail.test", true).await;

    let response = app
        .send(get(
            "/api/auth/signin/google?redirectUrl=https://app.cookstack.test/after",
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let state = cookie_value(&response, "google_oauth_state").unwrap();
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.contains(&format!("state={}", state)));
    assert!(location.contains("code_challenge_method=S256"));
    assert!(!cookie_value(&response, "google_oauth_code").unwrap().is_empty());
    assert!(!cookie_value(&response, "google_oauth_redirect")
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn a_new_google_user_is_created_verified_and_sent_back() {
    let app = with_google("Cook@Gmail.test", true).await;
    let (state, cookies) = start(&app, "?redirectUrl=https://app.cookstack.test/after").await;

    let response = callback(&app, &state, FakeOAuthProvider::GOOD_CODE, cookies).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://app.cookstack.test/after"
    );
    assert_oauth_cookies_cleared(&response);

    let session = cookie_value(&response, "session").unwrap();
    let me = app
        .json(Method::GET, "/api/users/me", Some(&session), None)
        .await;
    assert_eq!(me.status(), StatusCode::OK);
    let user = body_json(me).await["user"].clone();
    assert_eq!(user["email"], "cook@gmail.test");
    assert_eq!(user["emailVerified"], true);
    assert_eq!(user["name"], "Google Cook");
}

#[tokio::test]
async fn without_a_redirect_the_browser_returns_to_the_app() {
    let app = with_google("cook@gmail.test", true).await;
    let (state, cookies) = start(&app, "").await;

    let response = callback(&app, &state, FakeOAuthProvider::GOOD_CODE, cookies).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[header::LOCATION], "http://localhost:3000/");
}

#[tokio::test]
async fn an_existing_account_is_linked_and_marked_verified() {
    let app = with_google("cook@gmail.test", true).await;
    let (id, _) = app.sign_up("cook@gmail.test").await;

    let (state, cookies) = start(&app, "").await;
    let response = callback(&app, &state, FakeOAuthProvider::GOOD_CODE, cookies).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);

    let session = cookie_value(&response, "session").unwrap();
    let user = body_json(
        app.json(Method::GET, "/api/users/me", Some(&session), None)
            .await,
    )
    .await["user"]
        .clone();
    assert_eq!(user["id"], id.to_string());
    assert_eq!(user["emailVerified"], true);

    // The second round trip finds the linked account directly.
    let (state, cookies) = start(&app, "").await;
    let response = callback(&app, &state, FakeOAuthProvider::GOOD_CODE, cookies).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
}

#[tokio::test]
async fn a_state_mismatch_is_rejected_and_clears_the_cookies() {
    let app = with_google("cook@gmail.test", true).await;
    let (_, cookies) = start(&app, "").await;

    let response = callback(&app, "forged", FakeOAuthProvider::GOOD_CODE, cookies).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_oauth_cookies_cleared(&response);
    assert!(cookie_value(&response, "session").is_none());
}

#[tokio::test]
async fn an_unverified_provider_email_is_refused() {
    let app = with_google("cook@gmail.test", false).await;
    let (state, cookies) = start(&app, "").await;

    let response = callback(&app, &state, FakeOAuthProvider::GOOD_CODE, cookies).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(cookie_value(&response, "session").is_none());
}

#[tokio::test]
async fn a_failed_code_exchange_is_a_server_error() {
    let app = with_google("cook@gmail.test", true).await;
    let (state, cookies) = start(&app, "").await;

    let response = callback(&app, &state, "bad-code", cookies).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_oauth_cookies_cleared(&response);
}

#[tokio::test]
async fn google_routes_are_absent_when_not_configured() {
    let app = TestApp::spawn().await;
    let response = app.send(get("/api/auth/signin/google", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
