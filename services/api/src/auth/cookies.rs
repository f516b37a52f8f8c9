//! services/api/src/auth/cookies.rs
//!
//! Building `Set-Cookie` values for the session cookie and the short-lived
//! OAuth cookies, and reading cookies back from request headers.

use crate::config::Config;
use axum::http::{header, HeaderMap};
use std::fmt;

pub const SESSION_COOKIE: &str = "session";
pub const OAUTH_STATE_COOKIE: &str = "google_oauth_state";
pub const OAUTH_VERIFIER_COOKIE: &str = "google_oauth_code";
pub const OAUTH_REDIRECT_COOKIE: &str = "google_oauth_redirect";

/// Lifetime of the OAuth state/verifier cookies.
pub const OAUTH_COOKIE_MAX_AGE: i64 = 10 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

/// Attributes of one `Set-Cookie` header.
#[derive(Debug, Clone)]
pub struct CookieAttributes {
    pub name: &'static str,
    pub value: String,
    pub max_age: i64,
    pub domain: Option<String>,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl fmt::Display for CookieAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path=/; Max-Age={}; HttpOnly", self.name, self.value, self.max_age)?;
        if let Some(domain) = &self.domain {
            write!(f, "; Domain=.{}", domain)?;
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        if let Some(same_site) = self.same_site {
            write!(f, "; SameSite={}", same_site)?;
        }
        Ok(())
    }
}

/// Environment-dependent cookie attributes.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    production: bool,
    domain: Option<String>,
}

impl CookieSettings {
    pub fn new(production: bool, domain: Option<String>) -> Self {
        Self { production, domain }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.production, config.cookie_domain.clone())
    }

    /// The session cookie, shared across subdomains of the apex domain.
    pub fn session(&self, session_id: &str, max_age: i64) -> CookieAttributes {
        CookieAttributes {
            name: SESSION_COOKIE,
            value: session_id.to_string(),
            max_age,
            domain: self.domain.clone(),
            secure: self.production,
            same_site: self.production.then_some(SameSite::None),
        }
    }

    /// Instructs the client to drop its session cookie.
    pub fn blank_session(&self) -> CookieAttributes {
        self.session("", 0)
    }

    pub fn oauth(&self, name: &'static str, value: &str) -> CookieAttributes {
        CookieAttributes {
            name,
            value: value.to_string(),
            max_age: OAUTH_COOKIE_MAX_AGE,
            domain: None,
            secure: self.production,
            same_site: Some(SameSite::Lax),
        }
    }

    pub fn clear_oauth(&self, name: &'static str) -> CookieAttributes {
        CookieAttributes {
            max_age: 0,
            ..self.oauth(name, "")
        }
    }
}

/// Reads a cookie value from the `Cookie` request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn development_session_cookie_has_no_secure_or_same_site() {
        let cookie = CookieSettings::new(false, None).session("abc", 60).to_string();
        assert_eq!(cookie, "session=abc; Path=/; Max-Age=60; HttpOnly");
    }

    #[test]
    fn production_session_cookie_is_cross_site_and_apex_scoped() {
        let cookie = CookieSettings::new(true, Some("cookstack.app".into()))
            .session("abc", 60)
            .to_string();
        assert_eq!(
            cookie,
            "session=abc; Path=/; Max-Age=60; HttpOnly; Domain=.cookstack.app; Secure; SameSite=None"
        );
    }

    #[test]
    fn blank_session_clears_the_cookie() {
        let cookie = CookieSettings::new(false, None).blank_session().to_string();
        assert!(cookie.starts_with("session=; Path=/; Max-Age=0"));
    }

    #[test]
    fn oauth_cookies_live_ten_minutes() {
        let cookie = CookieSettings::new(true, None)
            .oauth(OAUTH_STATE_COOKIE, "state")
            .to_string();
        assert_eq!(
            cookie,
            "google_oauth_state=state; Path=/; Max-Age=600; HttpOnly; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn reads_cookies_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; session=xyz"));
        headers.append(header::COOKIE, HeaderValue::from_static("google_oauth_state=s"));
        assert_eq!(read_cookie(&headers, SESSION_COOKIE).as_deref(), Some("xyz"));
        assert_eq!(read_cookie(&headers, OAUTH_STATE_COOKIE).as_deref(), Some("s"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_value_reads_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(read_cookie(&headers, SESSION_COOKIE), None);
    }
}
