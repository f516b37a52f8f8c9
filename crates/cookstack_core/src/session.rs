//! crates/cookstack_core/src/session.rs
//!
//! Session lifetime policy: how long a session lives and when it is renewed.

use crate::domain::AuthSession;
use chrono::{DateTime, Duration, Utc};

/// Where a stored session stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Valid, no renewal needed.
    Active,
    /// Valid but past half its lifetime; renew the expiry and re-issue the cookie.
    Fresh,
    Expired,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    lifetime: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            lifetime: Duration::days(30),
        }
    }
}

impl SessionPolicy {
    pub fn new(lifetime: Duration) -> Self {
        Self { lifetime }
    }

    pub fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.lifetime
    }

    pub fn classify(&self, session: &AuthSession, now: DateTime<Utc>) -> SessionStatus {
        if now >= session.expires_at {
            SessionStatus::Expired
        } else if session.expires_at - now < self.lifetime / 2 {
            SessionStatus::Fresh
        } else {
            SessionStatus::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn session_expiring_at(expires_at: DateTime<Utc>) -> AuthSession {
        AuthSession {
            id: "s".into(),
            user_id: Uuid::new_v4(),
            expires_at,
        }
    }

    #[test]
    fn brand_new_session_is_active() {
        let policy = SessionPolicy::default();
        let now = Utc::now();
        let session = session_expiring_at(policy.expiry_from(now));
        assert_eq!(policy.classify(&session, now), SessionStatus::Active);
    }

    #[test]
    fn session_past_half_life_is_fresh() {
        let policy = SessionPolicy::default();
        let now = Utc::now();
        let session = session_expiring_at(now + Duration::days(14));
        assert_eq!(policy.classify(&session, now), SessionStatus::Fresh);
    }

    #[test]
    fn session_at_expiry_is_expired() {
        let policy = SessionPolicy::default();
        let now = Utc::now();
        assert_eq!(policy.classify(&session_expiring_at(now), now), SessionStatus::Expired);
        assert_eq!(
            policy.classify(&session_expiring_at(now - Duration::seconds(1)), now),
            SessionStatus::Expired
        );
    }

    #[test]
    fn custom_lifetime_moves_the_threshold() {
        let policy = SessionPolicy::new(Duration::hours(2));
        let now = Utc::now();
        assert_eq!(
            policy.classify(&session_expiring_at(now + Duration::minutes(61)), now),
            SessionStatus::Active
        );
        assert_eq!(
            policy.classify(&session_expiring_at(now + Duration::minutes(59)), now),
            SessionStatus::Fresh
        );
    }
}
