mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, id_of, TestApp};
use cookstack_core::Role;
use serde_json::json;

async fn request_role(app: &TestApp, session: &str, role: &str) -> axum::response::Response {
    app.json(
        Method::POST,
        "/api/role-requests",
        Some(session),
        Some(json!({ "role": role })),
    )
    .await
}

#[tokio::test]
async fn only_verified_users_may_ask_for_a_role() {
    let app = TestApp::spawn().await;
    let (_, unverified) = app.sign_up("new@cookstack.test").await;

    let response = request_role(&app, &unverified, "author").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn the_user_role_and_unknown_roles_cannot_be_requested() {
    let app = TestApp::spawn().await;
    let (_, session) = app.verified_user("cook@cookstack.test").await;

    for role in ["user", "chef"] {
        let response = request_role(&app, &session, role).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", role);
        assert!(body_json(response).await["error"]["role"].is_string());
    }
}

#[tokio::test]
async fn one_pending_request_per_role() {
    let app = TestApp::spawn().await;
    let (user_id, session) = app.verified_user("cook@cookstack.test").await;

    let response = request_role(&app, &session, "author").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["userId"], user_id.to_string());
    assert_eq!(body["status"], "pending");

    let response = request_role(&app, &session, "author").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = request_role(&app, &session, "admin").await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn approval_grants_the_role_and_ends_the_users_sessions() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.user_with_role("admin@cookstack.test", Role::Admin).await;
    let (_, session) = app.verified_user("cook@cookstack.test").await;

    let request = id_of(body_json(request_role(&app, &session, "author").await).await);

    let response = app
        .json(Method::GET, "/api/role-requests", Some(&session), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let pending = body_json(
        app.json(Method::GET, "/api/role-requests", Some(&admin), None)
            .await,
    )
    .await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let approve = format!("/api/role-requests/{}/approve", request);
    let response = app.json(Method::POST, &approve, Some(&admin), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "approved");

    let response = app
        .json(Method::GET, "/api/users/me", Some(&session), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let session = app.sign_in("cook@cookstack.test").await;
    let me = body_json(
        app.json(Method::GET, "/api/users/me", Some(&session), None)
            .await,
    )
    .await;
    assert_eq!(me["user"]["role"], "author");

    let response = app.json(Method::POST, &approve, Some(&admin), None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let pending = body_json(
        app.json(Method::GET, "/api/role-requests", Some(&admin), None)
            .await,
    )
    .await;
    assert!(pending.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rejection_leaves_the_role_unchanged() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.user_with_role("admin@cookstack.test", Role::Admin).await;
    let (_, session) = app.verified_user("cook@cookstack.test").await;
    let request = id_of(body_json(request_role(&app, &session, "admin").await).await);

    let response = app
        .json(
            Method::POST,
            &format!("/api/role-requests/{}/reject", request),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "rejected");

    let me = body_json(
        app.json(Method::GET, "/api/users/me", Some(&session), None)
            .await,
    )
    .await;
    assert_eq!(me["user"]["role"], "user");

    let response = app
        .json(
            Method::POST,
            &format!("/api/role-requests/{}/approve", uuid::Uuid::new_v4()),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
