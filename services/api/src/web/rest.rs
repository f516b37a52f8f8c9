//! services/api/src/web/rest.rs
//!
//! The health check and the master definition for the OpenAPI specification.

use crate::web::{auth, categories, recipes, role_requests, users};
use axum::Json;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        auth::sign_up,
        auth::sign_in,
        auth::sign_out,
        auth::sign_out_all,
        auth::change_password,
        auth::resend_verification,
        auth::verify_email,
        auth::request_password_reset,
        auth::reset_password,
        auth::google_start,
        auth::google_callback,
        users::me,
        users::update_me,
        role_requests::create,
        role_requests::list_pending,
        role_requests::approve,
        role_requests::reject,
        categories::list,
        categories::create,
        categories::rename,
        categories::delete,
        recipes::list,
        recipes::detail,
        recipes::create,
        recipes::update,
        recipes::delete,
        recipes::upload_image,
    ),
    components(
        schemas(
            HealthResponse,
            auth::SignUpRequest,
            auth::SignInRequest,
            auth::ResetRequest,
            auth::NewPasswordRequest,
            auth::ChangePasswordRequest,
            users::UserResponse,
            users::UserEnvelope,
            users::UpdateProfileRequest,
            role_requests::CreateRoleRequest,
            role_requests::RoleRequestResponse,
            categories::CategoryRequest,
            categories::CategoryResponse,
            recipes::CreateRecipeRequest,
            recipes::UpdateRecipeRequest,
            recipes::RecipeResponse,
            recipes::RecipePage,
            recipes::RecipeDetail,
            recipes::SectionResponse,
            crate::web::collections::ItemPayload,
            crate::web::collections::AppendPayload,
            crate::web::collections::ItemResponse,
            crate::web::collections::TranslationBody,
        )
    ),
    tags(
        (name = "CookStack API", description = "Recipes, their ordered sections, and the accounts that write them.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Health
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

/// Liveness check. Not rate limited and never cached.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
