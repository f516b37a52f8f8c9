//! services/api/src/web/role_requests.rs
//!
//! Users ask for the author or admin role; admins approve or reject.

use crate::error::{AppError, AppResult};
use crate::web::context::{CurrentUser, VerifiedUser};
use crate::web::extract::{AppJson, AppPath};
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use cookstack_core::authz::{require_role, ADMINS};
use cookstack_core::{PortError, Role, RoleRequest, RoleRequestStatus, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoleRequest {
    /// `author` or `admin`.
    pub role: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequestResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<RoleRequest> for RoleRequestResponse {
    fn from(request: RoleRequest) -> Self {
        Self {
            id: request.id,
            user_id: request.user_id,
            role: request.role.as_str().to_string(),
            status: request.status.as_str().to_string(),
            created_at: request.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/role-requests",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Request filed", body = RoleRequestResponse),
        (status = 400, description = "Role cannot be requested"),
        (status = 401, description = "No session"),
        (status = 403, description = "Email not verified"),
        (status = 409, description = "A request for this role is already pending")
    )
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    VerifiedUser(user): VerifiedUser,
    AppJson(req): AppJson<CreateRoleRequest>,
) -> AppResult<(StatusCode, Json<RoleRequestResponse>)> {
    let role = req
        .role
        .parse::<Role>()
        .map_err(|_| AppError::field("role", "invalidRole"))?;
    if role == Role::User || role == user.role {
        return Err(AppError::field("role", "invalidRole"));
    }

    let request = RoleRequest {
        id: Uuid::new_v4(),
        user_id: user.id,
        role,
        status: RoleRequestStatus::Pending,
        created_at: Utc::now(),
    };
    state
        .credentials
        .create_role_request(&request)
        .await
        .map_err(|e| match e {
            e if e.is_unique_violation() => AppError::Conflict("requestPending"),
            e => e.into(),
        })?;
    info!(user_id = %user.id, role = %role, "Role requested");

    Ok((StatusCode::CREATED, Json(request.into())))
}

/// Pending requests, oldest first.
#[utoipa::path(
    get,
    path = "/api/role-requests",
    responses(
        (status = 200, description = "Pending requests", body = [RoleRequestResponse]),
        (status = 401, description = "No session"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<RoleRequestResponse>>> {
    require_role(Some(&user), ADMINS)?;
    let requests = state.credentials.list_pending_role_requests().await?;
    Ok(Json(requests.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/role-requests/{id}/approve",
    params(("id" = Uuid, Path, description = "Role request id")),
    responses(
        (status = 200, description = "Approved; the user's sessions were ended", body = RoleRequestResponse),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "No such request"),
        (status = 409, description = "Already decided")
    )
)]
pub async fn approve(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath(request_id): AppPath<Uuid>,
) -> AppResult<Json<RoleRequestResponse>> {
    decide(&state, &user, request_id, true).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/api/role-requests/{id}/reject",
    params(("id" = Uuid, Path, description = "Role request id")),
    responses(
        (status = 200, description = "Rejected", body = RoleRequestResponse),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "No such request"),
        (status = 409, description = "Already decided")
    )
)]
pub async fn reject(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath(request_id): AppPath<Uuid>,
) -> AppResult<Json<RoleRequestResponse>> {
    decide(&state, &user, request_id, false).await.map(Json)
}

async fn decide(
    state: &AppState,
    admin: &User,
    request_id: Uuid,
    approve: bool,
) -> AppResult<RoleRequestResponse> {
    require_role(Some(admin), ADMINS)?;

    let existing = state
        .credentials
        .find_role_request(request_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if existing.status != RoleRequestStatus::Pending {
        return Err(AppError::Conflict("requestDecided"));
    }

    // A concurrent decision can still win between the read and the update.
    let decided = state
        .credentials
        .decide_role_request(request_id, approve)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => AppError::Conflict("requestDecided"),
            e => e.into(),
        })?;
    info!(
        admin_id = %admin.id,
        user_id = %decided.user_id,
        role = %decided.role,
        status = decided.status.as_str(),
        "Role request decided"
    );
    Ok(decided.into())
}
