//! crates/cookstack_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{
    AuthSession, Category, EmailVerificationCode, NewRecipe, OAuthAccount, OAuthProfile,
    OrderedItem, PasswordResetToken, ProfileUpdate, Recipe, RecipeQuery, RecipeUpdate,
    RoleRequest, SectionDetail, Translation, User,
};
use crate::ordering::{CollectionKind, ReplacePlan};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness invariant was violated. `constraint` names the offending
    /// columns or index as reported by the store.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("Foreign key constraint violated")]
    ForeignKeyViolation,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, PortError::UniqueViolation { .. })
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports
//=========================================================================================

/// Outcome of a guarded category delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryDeletion {
    Deleted,
    NotFound,
    ContainsRecipes,
}

/// Users, sessions, OAuth links, verification codes, reset tokens and role requests.
///
/// Every method that touches more than one table is atomic.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // --- Users ---
    async fn create_user_with_verification(
        &self,
        user: &User,
        code: &EmailVerificationCode,
    ) -> PortResult<()>;

    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>>;

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> PortResult<User>;

    // --- Sessions ---
    async fn create_session(&self, session: &AuthSession) -> PortResult<()>;

    async fn find_session(&self, session_id: &str) -> PortResult<Option<AuthSession>>;

    async fn extend_session(&self, session_id: &str, expires_at: DateTime<Utc>) -> PortResult<()>;

    async fn delete_session(&self, session_id: &str) -> PortResult<()>;

    async fn delete_user_sessions(&self, user_id: Uuid) -> PortResult<()>;

    // --- OAuth ---
    async fn find_oauth_user(
        &self,
        provider_id: &str,
        provider_user_id: &str,
    ) -> PortResult<Option<User>>;

    /// Inserts a new user together with its OAuth link.
    async fn create_oauth_user(&self, user: &User, account: &OAuthAccount) -> PortResult<()>;

    /// Links an existing user, filling only the empty profile fields from `backfill`.
    async fn link_oauth_account(
        &self,
        account: &OAuthAccount,
        backfill: &ProfileUpdate,
        mark_verified: bool,
    ) -> PortResult<User>;

    // --- Email verification ---
    async fn find_verification_code(
        &self,
        user_id: Uuid,
    ) -> PortResult<Option<EmailVerificationCode>>;

    async fn replace_verification_code(&self, code: &EmailVerificationCode) -> PortResult<()>;

    /// Deletes the code and every session of the user, then marks the user verified.
    async fn complete_email_verification(&self, user_id: Uuid) -> PortResult<User>;

    // --- Password reset ---
    async fn replace_password_reset_token(&self, token: &PasswordResetToken) -> PortResult<()>;

    /// Deletes the token row matching `token_hash` and returns what was deleted.
    async fn take_password_reset_token(
        &self,
        token_hash: &str,
    ) -> PortResult<Option<PasswordResetToken>>;

    /// Deletes every session and reset token of the user and stores the new hash.
    async fn reset_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<User>;

    // --- Role requests ---
    async fn create_role_request(&self, request: &RoleRequest) -> PortResult<()>;

    async fn find_role_request(&self, request_id: Uuid) -> PortResult<Option<RoleRequest>>;

    async fn list_pending_role_requests(&self) -> PortResult<Vec<RoleRequest>>;

    /// Decides a pending request. Approval also grants `role` and revokes the
    /// user's sessions. Fails with `NotFound` when no pending request matches.
    async fn decide_role_request(&self, request_id: Uuid, approve: bool)
        -> PortResult<RoleRequest>;
}

/// Categories, recipes and the ordered collections beneath them.
#[async_trait]
pub trait ContentStore: Send + Sync {
    // --- Categories ---
    async fn list_categories(&self) -> PortResult<Vec<Category>>;

    async fn find_category(&self, category_id: Uuid) -> PortResult<Option<Category>>;

    async fn create_category(&self, category: &Category) -> PortResult<()>;

    async fn rename_category(&self, category_id: Uuid, name: &str) -> PortResult<Category>;

    async fn delete_category(&self, category_id: Uuid) -> PortResult<CategoryDeletion>;

    // --- Recipes ---
    async fn find_recipes(&self, query: &RecipeQuery) -> PortResult<Vec<Recipe>>;

    async fn create_recipe(&self, recipe: &NewRecipe) -> PortResult<Recipe>;

    async fn update_recipe(&self, recipe_id: Uuid, update: &RecipeUpdate) -> PortResult<Recipe>;

    async fn delete_recipe(&self, recipe_id: Uuid) -> PortResult<bool>;

    async fn recipe_sections(&self, recipe_id: Uuid) -> PortResult<Vec<SectionDetail>>;

    // --- Ordered collections ---
    async fn find_item(&self, kind: CollectionKind, item_id: Uuid)
        -> PortResult<Option<OrderedItem>>;

    async fn list_items(&self, kind: CollectionKind, parent_id: Uuid)
        -> PortResult<Vec<OrderedItem>>;

    /// Atomically applies `plan` and returns the refreshed collection.
    async fn replace_items(
        &self,
        kind: CollectionKind,
        parent_id: Uuid,
        plan: &ReplacePlan,
    ) -> PortResult<Vec<OrderedItem>>;

    /// Inserts one item after the current last position.
    async fn append_item(
        &self,
        kind: CollectionKind,
        parent_id: Uuid,
        translations: &[Translation],
    ) -> PortResult<OrderedItem>;

    async fn delete_item(&self, kind: CollectionKind, parent_id: Uuid, item_id: Uuid)
        -> PortResult<bool>;
}

//=========================================================================================
// Outbound Service Ports
//=========================================================================================

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends an HTML email. Returns `false` when delivery failed.
    async fn send(&self, to: &str, subject: &str, html: &str) -> bool;
}

/// A file received from a client, ready to be stored.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the file and returns its public URL.
    async fn upload(&self, file: ImageUpload) -> PortResult<String>;
}

/// Tokens returned by a provider's code exchange.
#[derive(Debug, Clone)]
pub struct OAuthTokens {
    pub access_token: String,
    pub id_token: Option<String>,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    /// Builds the authorization URL for the given state and PKCE verifier.
    fn authorization_url(&self, state: &str, code_verifier: &str) -> String;

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> PortResult<OAuthTokens>;

    async fn fetch_profile(&self, tokens: &OAuthTokens) -> PortResult<OAuthProfile>;
}

/// A response snapshot kept by the response cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Every `clear` starts a new generation. A `put` tagged with an older
/// generation than the current one is dropped, so a response rendered before
/// a mutation cannot outlive the clear that mutation triggered.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn generation(&self) -> u64;

    async fn get(&self, key: &str) -> Option<CachedResponse>;

    async fn put(&self, key: &str, response: CachedResponse, ttl: Duration, generation: u64);

    async fn clear(&self);
}

/// Resolves message keys to localized text.
pub trait Translator: Send + Sync {
    fn translate(&self, locale: &str, key: &str, params: &[(&str, &str)]) -> String;
}
