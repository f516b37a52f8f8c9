//! services/api/src/web/recipes.rs
//!
//! Recipe listing, detail, authoring and image upload.

use crate::adapters::images::image_extension;
use crate::error::{AppError, AppResult};
use crate::web::collections::ItemResponse;
use crate::web::context::CurrentUser;
use crate::web::extract::{AppJson, AppPath};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::QueryRejection, Multipart, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use cookstack_core::authz::{is_admin, require_role, verify_author, CONTENT_EDITORS};
use cookstack_core::domain::{NewRecipe, RecipeUpdate, SectionDetail};
use cookstack_core::ports::ImageUpload;
use cookstack_core::{Recipe, RecipeQuery, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct RecipeListQuery {
    pub category_id: Option<Uuid>,
    /// 1-based.
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecipeRequest {
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 200, code = "invalidTitle"))]
    pub title: String,
    #[validate(length(max = 2000, code = "tooLong"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecipeRequest {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, code = "invalidTitle"))]
    pub title: Option<String>,
    #[validate(length(max = 2000, code = "tooLong"))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResponse {
    pub id: Uuid,
    pub category_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Recipe> for RecipeResponse {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            category_id: recipe.category_id,
            owner_id: recipe.owner_id,
            title: recipe.title,
            description: recipe.description,
            image_url: recipe.image_url,
            created_at: recipe.created_at,
            updated_at: recipe.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipePage {
    pub recipes: Vec<RecipeResponse>,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionResponse {
    #[serde(flatten)]
    pub section: ItemResponse,
    pub ingredients: Vec<ItemResponse>,
    pub instructions: Vec<ItemResponse>,
}

impl From<SectionDetail> for SectionResponse {
    fn from(detail: SectionDetail) -> Self {
        Self {
            section: detail.section.into(),
            ingredients: detail.ingredients.into_iter().map(Into::into).collect(),
            instructions: detail.instructions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub recipe: RecipeResponse,
    pub sections: Vec<SectionResponse>,
}

//=========================================================================================
// Helpers
//=========================================================================================

pub(crate) async fn find_recipe(state: &AppState, recipe_id: Uuid) -> AppResult<Recipe> {
    state
        .content
        .find_recipes(&RecipeQuery::ById(recipe_id))
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound)
}

/// Loads a recipe the user may change: an author or admin who owns it, or
/// any admin.
async fn editable_recipe(state: &AppState, user: &User, recipe_id: Uuid) -> AppResult<Recipe> {
    require_role(Some(user), CONTENT_EDITORS)?;
    let recipe = find_recipe(state, recipe_id).await?;
    verify_author(Some(user), recipe.owner_id, &[is_admin])?;
    Ok(recipe)
}

async fn ensure_category(state: &AppState, category_id: Uuid) -> AppResult<()> {
    match state.content.find_category(category_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound),
    }
}

fn page_of(query: RecipeListQuery) -> AppResult<RecipeQuery> {
    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE);
    if page == 0 {
        return Err(AppError::field("page", "invalidPage"));
    }
    if per_page == 0 || per_page > MAX_PER_PAGE {
        return Err(AppError::field("perPage", "invalidPage"));
    }
    Ok(RecipeQuery::List {
        category_id: query.category_id,
        page,
        per_page,
    })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Newest recipes first, optionally within one category.
#[utoipa::path(
    get,
    path = "/api/recipes",
    params(RecipeListQuery),
    responses(
        (status = 200, description = "A page of recipes", body = RecipePage),
        (status = 400, description = "Invalid paging parameters")
    )
)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RecipeListQuery>, QueryRejection>,
) -> AppResult<Json<RecipePage>> {
    let Query(query) = query.map_err(|_| AppError::field("page", "invalidPage"))?;
    let query = page_of(query)?;
    let recipes = state.content.find_recipes(&query).await?;

    let (page, per_page) = match query {
        RecipeQuery::List { page, per_page, .. } => (page, per_page),
        RecipeQuery::ById(_) => (1, DEFAULT_PER_PAGE),
    };
    Ok(Json(RecipePage {
        recipes: recipes.into_iter().map(Into::into).collect(),
        page,
        per_page,
    }))
}

/// A recipe with its sections, each with its ingredients and instructions.
#[utoipa::path(
    get,
    path = "/api/recipes/{recipe_id}",
    params(("recipe_id" = Uuid, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "The recipe tree", body = RecipeDetail),
        (status = 404, description = "No such recipe")
    )
)]
pub async fn detail(
    State(state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<Uuid>,
) -> AppResult<Json<RecipeDetail>> {
    let recipe = find_recipe(&state, recipe_id).await?;
    let sections = state.content.recipe_sections(recipe.id).await?;
    Ok(Json(RecipeDetail {
        recipe: recipe.into(),
        sections: sections.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/recipes",
    request_body = CreateRecipeRequest,
    responses(
        (status = 201, description = "Recipe created, owned by the caller", body = RecipeResponse),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Not an author or admin"),
        (status = 404, description = "No such category")
    )
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppJson(mut req): AppJson<CreateRecipeRequest>,
) -> AppResult<(StatusCode, Json<RecipeResponse>)> {
    require_role(Some(&user), CONTENT_EDITORS)?;
    req.title = req.title.trim().to_string();
    req.validate()?;
    ensure_category(&state, req.category_id).await?;

    let recipe = state
        .content
        .create_recipe(&NewRecipe {
            category_id: req.category_id,
            owner_id: user.id,
            title: req.title,
            description: req.description,
        })
        .await?;
    info!(user_id = %user.id, recipe_id = %recipe.id, "Recipe created");
    Ok((StatusCode::CREATED, Json(recipe.into())))
}

#[utoipa::path(
    patch,
    path = "/api/recipes/{recipe_id}",
    params(("recipe_id" = Uuid, Path, description = "Recipe id")),
    request_body = UpdateRecipeRequest,
    responses(
        (status = 200, description = "Recipe updated", body = RecipeResponse),
        (status = 403, description = "Not the owner or an admin"),
        (status = 404, description = "No such recipe or category")
    )
)]
pub async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath(recipe_id): AppPath<Uuid>,
    AppJson(mut req): AppJson<UpdateRecipeRequest>,
) -> AppResult<Json<RecipeResponse>> {
    let recipe = editable_recipe(&state, &user, recipe_id).await?;
    req.title = req.title.map(|t| t.trim().to_string());
    req.validate()?;
    if let Some(category_id) = req.category_id {
        ensure_category(&state, category_id).await?;
    }

    let recipe = state
        .content
        .update_recipe(
            recipe.id,
            &RecipeUpdate {
                category_id: req.category_id,
                title: req.title,
                description: req.description,
                image_url: None,
            },
        )
        .await?;
    Ok(Json(recipe.into()))
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{recipe_id}",
    params(("recipe_id" = Uuid, Path, description = "Recipe id")),
    responses(
        (status = 204, description = "Recipe and its sections deleted"),
        (status = 403, description = "Not the owner or an admin"),
        (status = 404, description = "No such recipe")
    )
)]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath(recipe_id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    let recipe = editable_recipe(&state, &user, recipe_id).await?;
    if !state.content.delete_recipe(recipe.id).await? {
        return Err(AppError::NotFound);
    }
    info!(user_id = %user.id, recipe_id = %recipe.id, "Recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the recipe image with the uploaded `file` part.
#[utoipa::path(
    put,
    path = "/api/recipes/{recipe_id}/image",
    params(("recipe_id" = Uuid, Path, description = "Recipe id")),
    request_body(content_type = "multipart/form-data", description = "A `file` part holding a JPEG, PNG, WebP or GIF image."),
    responses(
        (status = 200, description = "Image stored", body = RecipeResponse),
        (status = 400, description = "Missing or unsupported file"),
        (status = 403, description = "Not the owner or an admin"),
        (status = 404, description = "No such recipe")
    )
)]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath(recipe_id): AppPath<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<RecipeResponse>> {
    let recipe = editable_recipe(&state, &user, recipe_id).await?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Failed to read multipart data: {}", e);
        AppError::field("file", "missingFile")
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        if image_extension(&content_type).is_none() {
            return Err(AppError::field("file", "invalidImage"));
        }
        let file_name = field.file_name().unwrap_or("image").to_string();
        let bytes = field.bytes().await.map_err(|e| {
            warn!("Failed to read uploaded file: {}", e);
            AppError::field("file", "missingFile")
        })?;
        upload = Some(ImageUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload
        .filter(|u| !u.bytes.is_empty())
        .ok_or_else(|| AppError::field("file", "missingFile"))?;
    let image_url = state.images.upload(upload).await?;

    let recipe = state
        .content
        .update_recipe(
            recipe.id,
            &RecipeUpdate {
                image_url: Some(image_url),
                ..Default::default()
            },
        )
        .await?;
    info!(user_id = %user.id, recipe_id = %recipe.id, "Recipe image replaced");
    Ok(Json(recipe.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults_to_the_first_page() {
        assert_eq!(
            page_of(RecipeListQuery::default()).unwrap(),
            RecipeQuery::List {
                category_id: None,
                page: 1,
                per_page: DEFAULT_PER_PAGE,
            }
        );
    }

    #[test]
    fn page_zero_and_oversized_pages_are_rejected() {
        let zero = RecipeListQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(page_of(zero).is_err());

        let huge = RecipeListQuery {
            per_page: Some(MAX_PER_PAGE + 1),
            ..Default::default()
        };
        assert!(page_of(huge).is_err());
    }

    #[test]
    fn category_filter_is_carried_into_the_query() {
        let category_id = Uuid::new_v4();
        let query = page_of(RecipeListQuery {
            category_id: Some(category_id),
            page: Some(3),
            per_page: Some(10),
        })
        .unwrap();
        assert_eq!(
            query,
            RecipeQuery::List {
                category_id: Some(category_id),
                page: 3,
                per_page: 10,
            }
        );
    }
}
