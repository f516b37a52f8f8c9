//! services/api/src/web/users.rs
//!
//! The signed-in user's own profile.

use crate::error::AppResult;
use crate::web::context::CurrentUser;
use crate::web::extract::AppJson;
use crate::web::state::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use cookstack_core::domain::ProfileUpdate;
use cookstack_core::User;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// The public view of a user. Never carries the password hash.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub email_verified: bool,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            image_url: user.image_url,
            email_verified: user.email_verified,
            role: user.role.as_str().to_string(),
            created_at: user.created_at,
        }
    }
}

/// The `{user}` envelope returned by the auth and profile endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

impl From<User> for UserEnvelope {
    fn from(user: User) -> Self {
        Self { user: user.into() }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, code = "invalidName"))]
    pub name: Option<String>,
    #[validate(url(code = "invalidUrl"))]
    pub image_url: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "The signed-in user", body = UserEnvelope),
        (status = 401, description = "No session")
    )
)]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserEnvelope> {
    Json(user.into())
}

#[utoipa::path(
    patch,
    path = "/api/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserEnvelope),
        (status = 400, description = "Invalid name or image URL"),
        (status = 401, description = "No session")
    )
)]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppJson(mut req): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<UserEnvelope>> {
    req.name = req.name.map(|n| n.trim().to_string());
    req.validate()?;
    let update = ProfileUpdate {
        name: req.name,
        image_url: req.image_url,
    };
    let user = state.credentials.update_profile(user.id, &update).await?;
    Ok(Json(user.into()))
}
