//! crates/cookstack_core/src/authz.rs
//!
//! Role allow-lists and ownership checks gating mutating operations.
//! A missing session is always `Unauthorized`; role and ownership checks only
//! ever run for an authenticated user and fail with `Forbidden`.

use crate::domain::{Role, User};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
}

/// Roles allowed to create and edit categories and recipes.
pub const CONTENT_EDITORS: &[Role] = &[Role::Author, Role::Admin];

/// Roles allowed to administer users and role requests.
pub const ADMINS: &[Role] = &[Role::Admin];

/// An authorization predicate that grants access regardless of ownership.
pub type Bypass = fn(&User) -> bool;

pub fn is_admin(user: &User) -> bool {
    user.role == Role::Admin
}

/// Passes when the user holds one of the `allowed` roles.
pub fn require_role<'a>(user: Option<&'a User>, allowed: &[Role]) -> Result<&'a User, AccessError> {
    let user = user.ok_or(AccessError::Unauthorized)?;
    if allowed.contains(&user.role) {
        Ok(user)
    } else {
        Err(AccessError::Forbidden)
    }
}

/// Passes when the user owns the resource, or when any bypass predicate holds.
///
/// Ownership is checked first; bypasses are evaluated in the given order and
/// the first one that holds wins.
pub fn verify_author(
    user: Option<&User>,
    owner_id: Option<Uuid>,
    bypasses: &[Bypass],
) -> Result<(), AccessError> {
    let user = user.ok_or(AccessError::Unauthorized)?;
    if owner_id == Some(user.id) {
        return Ok(());
    }
    if bypasses.iter().any(|bypass| bypass(user)) {
        return Ok(());
    }
    Err(AccessError::Forbidden)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(role: Role) -> User {
        let mut user = User::new("cook@example.com".into(), None, None);
        user.role = role;
        user
    }

    #[test]
    fn missing_user_is_unauthorized_before_anything_else() {
        assert_eq!(require_role(None, ADMINS).unwrap_err(), AccessError::Unauthorized);
        assert_eq!(
            verify_author(None, Some(Uuid::new_v4()), &[is_admin]),
            Err(AccessError::Unauthorized)
        );
    }

    #[test]
    fn allow_list_is_explicit_not_hierarchical() {
        let admin = user_with(Role::Admin);
        let author = user_with(Role::Author);
        let plain = user_with(Role::User);

        assert!(require_role(Some(&author), CONTENT_EDITORS).is_ok());
        assert!(require_role(Some(&admin), CONTENT_EDITORS).is_ok());
        assert_eq!(
            require_role(Some(&plain), CONTENT_EDITORS).unwrap_err(),
            AccessError::Forbidden
        );
        // An allow-list naming only authors does not admit admins.
        assert_eq!(
            require_role(Some(&admin), &[Role::Author]).unwrap_err(),
            AccessError::Forbidden
        );
    }

    #[test]
    fn owner_passes_without_bypass() {
        let author = user_with(Role::Author);
        assert_eq!(verify_author(Some(&author), Some(author.id), &[]), Ok(()));
    }

    #[test]
    fn admin_bypasses_ownership() {
        let admin = user_with(Role::Admin);
        assert_eq!(verify_author(Some(&admin), Some(Uuid::new_v4()), &[is_admin]), Ok(()));
        assert_eq!(verify_author(Some(&admin), None, &[is_admin]), Ok(()));
    }

    #[test]
    fn non_owner_without_bypass_is_forbidden() {
        let author = user_with(Role::Author);
        assert_eq!(
            verify_author(Some(&author), Some(Uuid::new_v4()), &[is_admin]),
            Err(AccessError::Forbidden)
        );
        // Orphaned recipes can only be edited through a bypass.
        assert_eq!(verify_author(Some(&author), None, &[is_admin]), Err(AccessError::Forbidden));
    }

    #[test]
    fn any_matching_bypass_grants_access() {
        let author = user_with(Role::Author);
        let never: Bypass = |_| false;
        let authors: Bypass = |u| u.role == Role::Author;
        assert_eq!(
            verify_author(Some(&author), Some(Uuid::new_v4()), &[never, authors]),
            Ok(())
        );
    }
}
