//! crates/cookstack_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Users and Roles
//=========================================================================================

/// The role a user holds. Endpoints declare explicit allow-lists of roles;
/// roles are ordered by privilege but are not nested permission sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    User,
    Author,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Author => "author",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored or submitted role name is not one of the known roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "author" => Ok(Role::Author),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// A registered account. `hashed_password` is `None` for OAuth-only accounts.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub hashed_password: Option<String>,
    pub email_verified: bool,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Builds a fresh, unverified account with the `user` role.
    pub fn new(email: String, name: Option<String>, hashed_password: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            image_url: None,
            hashed_password,
            email_verified: false,
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial profile update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub image_url: Option<String>,
}

//=========================================================================================
// Credentials
//=========================================================================================

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Links an external identity to a local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthAccount {
    pub provider_id: String,
    pub provider_user_id: String,
    pub user_id: Uuid,
}

/// The profile returned by an OAuth provider after a successful code exchange.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub provider_user_id: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// The single outstanding email verification code of a user.
#[derive(Debug, Clone)]
pub struct EmailVerificationCode {
    pub user_id: Uuid,
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl EmailVerificationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A password reset token. Only the hash of the bearer value is ever stored.
#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

//=========================================================================================
// Role Requests
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RoleRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleRequestStatus::Pending => "pending",
            RoleRequestStatus::Approved => "approved",
            RoleRequestStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for RoleRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RoleRequestStatus::Pending),
            "approved" => Ok(RoleRequestStatus::Approved),
            "rejected" => Ok(RoleRequestStatus::Rejected),
            other => Err(format!("unknown role request status: {other}")),
        }
    }
}

/// A user's request to be granted a role. At most one pending request exists
/// per (user, role) pair.
#[derive(Debug, Clone)]
pub struct RoleRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub status: RoleRequestStatus,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Content
//=========================================================================================

#[derive(Debug, Clone)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A recipe. `owner_id` becomes `None` when the owning user is removed.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub id: Uuid,
    pub category_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub category_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeUpdate {
    pub category_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// How recipes are looked up: a single recipe by id, or a filtered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeQuery {
    ById(Uuid),
    List {
        category_id: Option<Uuid>,
        page: u32,
        per_page: u32,
    },
}

/// One localized text of an ordered item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub locale: String,
    pub text: String,
}

/// A position-ordered child (section, ingredient or instruction) of a parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedItem {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub position: i64,
    pub translations: Vec<Translation>,
}

/// A section together with its own ordered children, used by recipe detail reads.
#[derive(Debug, Clone)]
pub struct SectionDetail {
    pub section: OrderedItem,
    pub ingredients: Vec<OrderedItem>,
    pub instructions: Vec<OrderedItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip() {
        for role in [Role::User, Role::Author, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!("root".parse::<Role>(), Err(UnknownRole("root".into())));
    }

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::User < Role::Author);
        assert!(Role::Author < Role::Admin);
    }

    #[test]
    fn new_user_is_unverified_plain_user() {
        let user = User::new("a@b.c".into(), None, Some("hash".into()));
        assert!(!user.email_verified);
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn reset_token_expiry_is_inclusive() {
        let now = Utc::now();
        let token = PasswordResetToken {
            token_hash: "h".into(),
            user_id: Uuid::new_v4(),
            expires_at: now,
        };
        assert!(token.is_expired(now));
        assert!(!token.is_expired(now - chrono::Duration::seconds(1)));
    }
}
