//! services/api/src/error.rs
//!
//! Defines the error types of the API service: `ApiError` for startup and
//! binary-level failures, `AppError` for failures while serving a request.

use crate::config::ConfigError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use cookstack_core::{AccessError, PortError};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, error};

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// Request Errors
//=========================================================================================

/// Errors a handler can answer with. Each maps to a stable status code and a
/// message key that is localized before the response leaves the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email already in use")]
    EmailInUse,
    #[error("invalid verification code")]
    InvalidCode,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("a verification code is still outstanding")]
    VerificationCooldown,
    #[error("email already verified")]
    AlreadyVerified,
    #[error("oauth state mismatch")]
    OAuthStateMismatch,
    #[error("provider email is not verified")]
    UnverifiedProviderEmail,
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    #[error("unauthorized")]
    Unauthorized,
    #[error("email not verified")]
    Unverified,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error("rate limited")]
    RateLimited { retry_after: u64 },
    #[error("provider error: {0}")]
    ProviderError(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// The machine-readable shape of an error body, before localization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorPayload {
    Message(String),
    Fields(BTreeMap<String, String>),
}

impl ErrorPayload {
    pub fn to_json(&self, mut localize: impl FnMut(&str) -> String) -> Value {
        match self {
            ErrorPayload::Message(key) => json!({ "error": localize(key) }),
            ErrorPayload::Fields(fields) => {
                let localized: BTreeMap<&str, String> = fields
                    .iter()
                    .map(|(field, key)| (field.as_str(), localize(key)))
                    .collect();
                json!({ "error": localized })
            }
        }
    }
}

impl AppError {
    pub fn field(field: &str, key: &str) -> Self {
        AppError::Validation(BTreeMap::from([(field.to_string(), key.to_string())]))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidCredentials
            | AppError::EmailInUse
            | AppError::InvalidCode
            | AppError::InvalidToken
            | AppError::VerificationCooldown
            | AppError::AlreadyVerified
            | AppError::OAuthStateMismatch
            | AppError::UnverifiedProviderEmail
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Unverified | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ProviderError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        let key = match self {
            AppError::Validation(fields) => return ErrorPayload::Fields(fields.clone()),
            AppError::EmailInUse => {
                return ErrorPayload::Fields(BTreeMap::from([(
                    "email".to_string(),
                    "emailInUse".to_string(),
                )]))
            }
            AppError::InvalidCredentials => "invalidCredentials",
            AppError::InvalidCode => "invalidCode",
            AppError::InvalidToken => "invalidToken",
            AppError::VerificationCooldown => "verificationCooldown",
            AppError::AlreadyVerified => "alreadyVerified",
            AppError::OAuthStateMismatch => "invalidOAuthState",
            AppError::UnverifiedProviderEmail => "unverifiedProviderEmail",
            AppError::BadRequest(key) | AppError::Conflict(key) => *key,
            AppError::Unauthorized => "unauthorized",
            AppError::Unverified => "unverified",
            AppError::Forbidden => "forbidden",
            AppError::NotFound => "notFound",
            AppError::RateLimited { .. } => "rateLimited",
            AppError::ProviderError(_) | AppError::Internal(_) => "internalError",
        };
        ErrorPayload::Message(key.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(detail) => error!("Internal error: {}", detail),
            AppError::ProviderError(detail) => error!("OAuth provider error: {}", detail),
            _ => {}
        }

        let payload = self.payload();
        let body = payload.to_json(|key| key.to_string());
        let mut response = (self.status(), Json(body)).into_response();

        if let AppError::RateLimited { retry_after } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        // The pipeline swaps the keys for localized messages on the way out.
        response.extensions_mut().insert(payload);
        response
    }
}

impl From<PortError> for AppError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(_) => AppError::NotFound,
            PortError::UniqueViolation { .. } => AppError::Conflict("alreadyExists"),
            PortError::ForeignKeyViolation => AppError::Conflict("referenceMissing"),
            PortError::Unexpected(detail) => AppError::Internal(detail),
        }
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthorized => AppError::Unauthorized,
            AccessError::Forbidden => AppError::Forbidden,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .filter_map(|(field, errs)| {
                errs.first()
                    .map(|e| (camel_case(&field), e.code.to_string()))
            })
            .collect();
        AppError::Validation(fields)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected request body: {}", rejection.body_text());
        match rejection {
            JsonRejection::JsonSyntaxError(_) => AppError::BadRequest("malformedJson"),
            JsonRejection::MissingJsonContentType(_) => AppError::BadRequest("expectedJson"),
            _ => AppError::BadRequest("invalidBody"),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(e) => {
                debug!("Rejected path parameters: {}", e.body_text());
                AppError::BadRequest("invalidPath")
            }
            other => AppError::Internal(other.body_text()),
        }
    }
}

/// Request payloads are camelCase on the wire; validator reports Rust field names.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_are_stable() {
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::RateLimited { retry_after: 3 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_never_reach_the_payload() {
        let payload = AppError::Internal("UNIQUE constraint failed: users.email".into()).payload();
        assert_eq!(payload, ErrorPayload::Message("internalError".into()));
    }

    #[test]
    fn email_in_use_is_field_scoped() {
        let body = AppError::EmailInUse.payload().to_json(|k| k.to_string());
        assert_eq!(body, json!({ "error": { "email": "emailInUse" } }));
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err: AppError = PortError::UniqueViolation {
            constraint: "categories.name".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = AppError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn camel_cases_field_names() {
        assert_eq!(camel_case("password_confirm"), "passwordConfirm");
        assert_eq!(camel_case("email"), "email");
    }
}
