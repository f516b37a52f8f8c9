//! services/api/src/web/categories.rs
//!
//! Recipe categories. Reads are public; changes need the author or admin role.

use crate::error::{AppError, AppResult};
use crate::web::context::CurrentUser;
use crate::web::extract::{AppJson, AppPath};
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use cookstack_core::authz::{require_role, CONTENT_EDITORS};
use cookstack_core::ports::CategoryDeletion;
use cookstack_core::{Category, PortError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100, code = "invalidName"))]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            created_at: category.created_at,
        }
    }
}

/// Trims the submitted name and validates what is left.
fn clean_name(req: CategoryRequest) -> AppResult<String> {
    let req = CategoryRequest {
        name: req.name.trim().to_string(),
    };
    req.validate()?;
    Ok(req.name)
}

fn name_conflict(err: PortError) -> AppError {
    match err {
        e if e.is_unique_violation() => AppError::Conflict("nameExists"),
        e => e.into(),
    }
}

#[utoipa::path(
    get,
    path = "/api/categories",
    responses((status = 200, description = "All categories by name", body = [CategoryResponse]))
)]
pub async fn list(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<CategoryResponse>>> {
    let categories = state.content.list_categories().await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Invalid name"),
        (status = 403, description = "Not an author or admin"),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppJson(req): AppJson<CategoryRequest>,
) -> AppResult<(StatusCode, Json<CategoryResponse>)> {
    require_role(Some(&user), CONTENT_EDITORS)?;
    let category = Category {
        id: Uuid::new_v4(),
        name: clean_name(req)?,
        created_at: Utc::now(),
    };
    state
        .content
        .create_category(&category)
        .await
        .map_err(name_conflict)?;
    info!(user_id = %user.id, category_id = %category.id, "Category created");
    Ok((StatusCode::CREATED, Json(category.into())))
}

#[utoipa::path(
    patch,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category renamed", body = CategoryResponse),
        (status = 403, description = "Not an author or admin"),
        (status = 404, description = "No such category"),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn rename(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath(category_id): AppPath<Uuid>,
    AppJson(req): AppJson<CategoryRequest>,
) -> AppResult<Json<CategoryResponse>> {
    require_role(Some(&user), CONTENT_EDITORS)?;
    let name = clean_name(req)?;
    let category = state
        .content
        .rename_category(category_id, &name)
        .await
        .map_err(name_conflict)?;
    Ok(Json(category.into()))
}

/// Deletes an empty category. Categories still holding recipes are kept.
#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 403, description = "Not an author or admin"),
        (status = 404, description = "No such category"),
        (status = 409, description = "Category still contains recipes")
    )
)]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath(category_id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    require_role(Some(&user), CONTENT_EDITORS)?;
    match state.content.delete_category(category_id).await? {
        CategoryDeletion::Deleted => {
            info!(user_id = %user.id, category_id = %category_id, "Category deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        CategoryDeletion::NotFound => Err(AppError::NotFound),
        CategoryDeletion::ContainsRecipes => Err(AppError::Conflict("containsRecipes")),
    }
}
