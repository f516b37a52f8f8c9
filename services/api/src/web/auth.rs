//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: password sign-up and sign-in, sign-out, email
//! verification, password reset and change, and Google sign-in.

use crate::auth::cookies::{
    read_cookie, CookieAttributes, OAUTH_REDIRECT_COOKIE, OAUTH_STATE_COOKIE,
    OAUTH_VERIFIER_COOKIE,
};
use crate::auth::flows::{normalize_email, OAuthCallback, SignedIn};
use crate::auth::AuthFlows;
use crate::error::{AppError, AppResult};
use crate::web::context::{CurrentUser, RequestContext};
use crate::web::extract::{AppJson, AppPath};
use crate::web::state::AppState;
use crate::web::users::UserEnvelope;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignUpRequest {
    #[validate(email(code = "invalidEmail"))]
    pub email: String,
    #[validate(length(min = 8, max = 255, code = "passwordLength"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, code = "invalidName"))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignInRequest {
    #[validate(length(min = 1, code = "required"))]
    pub email: String,
    #[validate(length(min = 1, code = "required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetRequest {
    #[validate(email(code = "invalidEmail"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewPasswordRequest {
    #[validate(length(min = 8, max = 255, code = "passwordLength"))]
    pub password: String,
    #[validate(must_match(other = "password", code = "passwordMismatch"))]
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, code = "required"))]
    pub current_password: String,
    #[validate(length(min = 8, max = 255, code = "passwordLength"))]
    pub password: String,
    #[validate(must_match(other = "password", code = "passwordMismatch"))]
    pub password_confirm: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct RedirectQuery {
    /// Where the browser should land once the flow completes.
    pub redirect_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn set_cookies(
    cookies: impl IntoIterator<Item = CookieAttributes>,
) -> AppendHeaders<Vec<(HeaderName, String)>> {
    AppendHeaders(
        cookies
            .into_iter()
            .map(|cookie| (header::SET_COOKIE, cookie.to_string()))
            .collect(),
    )
}

/// `{user}` plus the cookie of the freshly issued session.
fn signed_in_response(state: &AppState, status: StatusCode, signed_in: SignedIn) -> Response {
    let cookie = state.sessions.session_cookie(&signed_in.session);
    (
        status,
        set_cookies([cookie]),
        Json(UserEnvelope::from(signed_in.user)),
    )
        .into_response()
}

// Redirect URLs may carry characters that are not allowed in a cookie value.
fn encode_redirect(redirect: &str) -> String {
    URL_SAFE_NO_PAD.encode(redirect)
}

fn decode_redirect(value: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    String::from_utf8(bytes).ok()
}

fn clear_oauth_cookies(state: &AppState) -> Vec<CookieAttributes> {
    [OAUTH_STATE_COOKIE, OAUTH_VERIFIER_COOKIE, OAUTH_REDIRECT_COOKIE]
        .into_iter()
        .map(|name| state.cookies.clear_oauth(name))
        .collect()
}

//=========================================================================================
// Password Accounts
//=========================================================================================

/// Creates an account, emails a verification code and signs the user in.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = UserEnvelope),
        (status = 400, description = "Invalid payload or email already in use"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    AppJson(mut req): AppJson<SignUpRequest>,
) -> AppResult<Response> {
    req.email = normalize_email(&req.email);
    req.name = req.name.map(|n| n.trim().to_string());
    req.validate()?;
    let signed_in = AuthFlows::new(&state, &ctx.locale)
        .sign_up(&req.email, &req.password, req.name)
        .await?;
    Ok(signed_in_response(&state, StatusCode::CREATED, signed_in))
}

#[utoipa::path(
    post,
    path = "/api/auth/signin",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = UserEnvelope),
        (status = 400, description = "Invalid credentials"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    AppJson(req): AppJson<SignInRequest>,
) -> AppResult<Response> {
    req.validate()?;
    let signed_in = AuthFlows::new(&state, &ctx.locale)
        .sign_in(&req.email, &req.password)
        .await?;
    Ok(signed_in_response(&state, StatusCode::OK, signed_in))
}

/// Ends the current session.
#[utoipa::path(
    post,
    path = "/api/auth/signout",
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "No session")
    )
)]
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> AppResult<Response> {
    let session = ctx.session.ok_or(AppError::Unauthorized)?;
    state.sessions.invalidate_session(&session.id).await?;
    Ok((
        StatusCode::NO_CONTENT,
        set_cookies([state.sessions.blank_cookie()]),
    )
        .into_response())
}

/// Ends every session of the signed-in user, on every device.
#[utoipa::path(
    post,
    path = "/api/auth/signout/all",
    responses(
        (status = 204, description = "All sessions ended"),
        (status = 401, description = "No session")
    )
)]
pub async fn sign_out_all(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Response> {
    state.sessions.invalidate_all_sessions(user.id).await?;
    Ok((
        StatusCode::NO_CONTENT,
        set_cookies([state.sessions.blank_cookie()]),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed, other sessions ended", body = UserEnvelope),
        (status = 400, description = "Invalid payload or wrong current password"),
        (status = 401, description = "No session")
    )
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    CurrentUser(user): CurrentUser,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> AppResult<Response> {
    req.validate()?;
    let signed_in = AuthFlows::new(&state, &ctx.locale)
        .change_password(&user, &req.current_password, &req.password)
        .await?;
    Ok(signed_in_response(&state, StatusCode::OK, signed_in))
}

//=========================================================================================
// Email Verification
//=========================================================================================

/// Sends a new verification code once the previous one has expired.
#[utoipa::path(
    post,
    path = "/api/auth/verify-email",
    responses(
        (status = 204, description = "Code sent"),
        (status = 400, description = "Already verified, or a code is still outstanding"),
        (status = 401, description = "No session")
    )
)]
pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    CurrentUser(user): CurrentUser,
) -> AppResult<StatusCode> {
    AuthFlows::new(&state, &ctx.locale)
        .resend_verification(&user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-email/{code}",
    params(("code" = String, Path, description = "The emailed verification code")),
    responses(
        (status = 200, description = "Email verified, sessions rotated", body = UserEnvelope),
        (status = 400, description = "Invalid or expired code"),
        (status = 401, description = "No session")
    )
)]
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    CurrentUser(user): CurrentUser,
    AppPath(code): AppPath<String>,
) -> AppResult<Response> {
    let signed_in = AuthFlows::new(&state, &ctx.locale)
        .verify_email(&user, &code)
        .await?;
    Ok(signed_in_response(&state, StatusCode::OK, signed_in))
}

//=========================================================================================
// Password Reset
//=========================================================================================

/// Emails a reset link. Answers 204 for any well-formed email so the
/// response does not reveal whether an account exists.
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    params(RedirectQuery),
    request_body = ResetRequest,
    responses(
        (status = 204, description = "Reset link sent if the account exists"),
        (status = 400, description = "Invalid email")
    )
)]
pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(query): Query<RedirectQuery>,
    AppJson(mut req): AppJson<ResetRequest>,
) -> AppResult<StatusCode> {
    req.email = normalize_email(&req.email);
    req.validate()?;
    AuthFlows::new(&state, &ctx.locale)
        .request_password_reset(&req.email, query.redirect_url.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password/{token}",
    params(("token" = String, Path, description = "The token from the reset link")),
    request_body = NewPasswordRequest,
    responses(
        (status = 200, description = "Password reset, signed in", body = UserEnvelope),
        (status = 400, description = "Invalid payload, or invalid or expired token")
    )
)]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    AppPath(token): AppPath<String>,
    AppJson(req): AppJson<NewPasswordRequest>,
) -> AppResult<Response> {
    // Validated before the token is consumed so a typo does not burn it.
    req.validate()?;
    let signed_in = AuthFlows::new(&state, &ctx.locale)
        .reset_password(&token, &req.password)
        .await?;
    Ok(signed_in_response(&state, StatusCode::OK, signed_in))
}

//=========================================================================================
// Google Sign-In
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/auth/signin/google",
    params(RedirectQuery),
    responses(
        (status = 302, description = "Redirect to Google"),
        (status = 404, description = "Google sign-in is not configured")
    )
)]
pub async fn google_start(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(query): Query<RedirectQuery>,
) -> AppResult<Response> {
    let provider = state.google.as_deref().ok_or(AppError::NotFound)?;
    let start = AuthFlows::new(&state, &ctx.locale)
        .begin_oauth(provider, query.redirect_url.as_deref());

    let redirect_cookie = match &start.redirect {
        Some(redirect) => state
            .cookies
            .oauth(OAUTH_REDIRECT_COOKIE, &encode_redirect(redirect)),
        None => state.cookies.clear_oauth(OAUTH_REDIRECT_COOKIE),
    };
    let cookies = [
        state.cookies.oauth(OAUTH_STATE_COOKIE, &start.state),
        state.cookies.oauth(OAUTH_VERIFIER_COOKIE, &start.code_verifier),
        redirect_cookie,
    ];

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, start.authorization_url)],
        set_cookies(cookies),
    )
        .into_response())
}

/// Completes Google sign-in and sends the browser back to the app. The
/// transient OAuth cookies are cleared whatever the outcome.
#[utoipa::path(
    get,
    path = "/api/auth/signin/google/callback",
    params(CallbackQuery),
    responses(
        (status = 301, description = "Signed in, redirect to the app"),
        (status = 400, description = "State mismatch or unverified provider email"),
        (status = 500, description = "Provider failure")
    )
)]
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let provider = state.google.as_deref().ok_or(AppError::NotFound)?;
    let callback = OAuthCallback {
        state: query.state,
        code: query.code,
        cookie_state: read_cookie(&headers, OAUTH_STATE_COOKIE),
        cookie_verifier: read_cookie(&headers, OAUTH_VERIFIER_COOKIE),
        cookie_redirect: read_cookie(&headers, OAUTH_REDIRECT_COOKIE)
            .and_then(|value| decode_redirect(&value)),
    };

    let mut cookies = clear_oauth_cookies(&state);
    match AuthFlows::new(&state, &ctx.locale)
        .complete_oauth(provider, callback)
        .await
    {
        Ok((signed_in, destination)) => {
            cookies.push(state.sessions.session_cookie(&signed_in.session));
            Ok((
                StatusCode::MOVED_PERMANENTLY,
                [(header::LOCATION, destination.to_string())],
                set_cookies(cookies),
            )
                .into_response())
        }
        Err(e) => Ok((set_cookies(cookies), e).into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_cookie_value_survives_reserved_characters() {
        let redirect = "https://cookstack.app/recipes?tab=a;b,c";
        let encoded = encode_redirect(redirect);
        assert!(!encoded.contains(';') && !encoded.contains(','));
        assert_eq!(decode_redirect(&encoded).as_deref(), Some(redirect));
    }

    #[test]
    fn tampered_redirect_cookie_reads_as_absent() {
        assert_eq!(decode_redirect("%%%"), None);
    }

    #[test]
    fn password_confirmation_must_match() {
        let req = NewPasswordRequest {
            password: "correct horse".into(),
            password_confirm: "correct hose".into(),
        };
        let err = AppError::from(req.validate().unwrap_err());
        match err {
            AppError::Validation(fields) => {
                assert_eq!(fields.get("passwordConfirm").map(String::as_str), Some("passwordMismatch"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn short_passwords_are_rejected_on_sign_up() {
        let req = SignUpRequest {
            email: "cook@example.com".into(),
            password: "short".into(),
            name: None,
        };
        assert!(req.validate().is_err());
    }
}
