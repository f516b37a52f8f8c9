mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, TestApp};
use cookstack_core::Role;
use serde_json::json;

#[tokio::test]
async fn a_category_is_deleted_only_once_it_is_empty() {
    let app = TestApp::spawn().await;
    let (_, author) = app.user_with_role("chef@cookstack.test", Role::Author).await;

    let category = app.create_category(&author, "Test 1").await;

    let response = app
        .json(
            Method::POST,
            "/api/categories",
            Some(&author),
            Some(json!({ "name": "Test 1" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["error"],
        "This name is already taken."
    );

    let recipe = app.create_recipe(&author, category, "Flatbread").await;
    let category_uri = format!("/api/categories/{}", category);

    let response = app
        .json(Method::DELETE, &category_uri, Some(&author), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["error"],
        "This category still contains recipes."
    );

    let response = app
        .json(
            Method::DELETE,
            &format!("/api/recipes/{}", recipe),
            Some(&author),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .json(Method::DELETE, &category_uri, Some(&author), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .json(Method::DELETE, &category_uri, Some(&author), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn readers_cannot_manage_categories() {
    let app = TestApp::spawn().await;
    let (_, reader) = app.verified_user("reader@cookstack.test").await;

    let response = app
        .json(
            Method::POST,
            "/api/categories",
            Some(&reader),
            Some(json!({ "name": "Soups" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .json(
            Method::POST,
            "/api/categories",
            None,
            Some(json!({ "name": "Soups" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn renaming_trims_and_checks_the_name() {
    let app = TestApp::spawn().await;
    let (_, author) = app.user_with_role("chef@cookstack.test", Role::Author).await;
    let soups = app.create_category(&author, "Soups").await;
    app.create_category(&author, "Stews").await;
    let uri = format!("/api/categories/{}", soups);

    let response = app
        .json(Method::PATCH, &uri, Some(&author), Some(json!({ "name": "  Broths " })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Broths");

    let response = app
        .json(Method::PATCH, &uri, Some(&author), Some(json!({ "name": "Stews" })))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .json(Method::PATCH, &uri, Some(&author), Some(json!({ "name": "   " })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let listed = body_json(app.json(Method::GET, "/api/categories", None, None).await).await;
    let names: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Broths", "Stews"]);
}

#[tokio::test]
async fn recipes_are_listed_per_category_and_page() {
    let app = TestApp::spawn().await;
    let (_, author) = app.user_with_role("chef@cookstack.test", Role::Author).await;
    let breads = app.create_category(&author, "Breads").await;
    let cakes = app.create_category(&author, "Cakes").await;
    for title in ["Baguette", "Focaccia", "Naan"] {
        app.create_recipe(&author, breads, title).await;
    }
    app.create_recipe(&author, cakes, "Sponge").await;

    let uri = format!("/api/recipes?categoryId={}&page=2&perPage=2", breads);
    let response = app.json(Method::GET, &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["page"], 2);
    assert_eq!(page["perPage"], 2);
    assert_eq!(page["recipes"].as_array().unwrap().len(), 1);

    let response = app
        .json(Method::GET, "/api/recipes?page=0", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .json(
            Method::POST,
            "/api/recipes",
            Some(&author),
            Some(json!({ "categoryId": uuid::Uuid::new_v4(), "title": "Orphan" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
