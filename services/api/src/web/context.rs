//! services/api/src/web/context.rs
//!
//! The per-request context shared by interceptors and handlers, and the
//! extractors handlers use to read it.

use crate::auth::cookies::CookieAttributes;
use crate::config::Config;
use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
};
use cookstack_core::{AuthSession, User};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Headers consulted for the client address, most trusted first.
const IP_HEADERS: &[&str] = &["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: Option<User>,
    pub session: Option<AuthSession>,
    pub client_ip: Option<IpAddr>,
    /// The client address with its host part zeroed, safe to log.
    pub anonymized_ip: Option<String>,
    pub locale: String,
    /// Cookies an interceptor wants set on the way out.
    pub cookies: Vec<CookieAttributes>,
}

impl RequestContext {
    pub fn from_request(req: &Request, config: &Config) -> Self {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let client_ip = client_ip(req.headers(), peer);

        Self {
            user: None,
            session: None,
            client_ip,
            anonymized_ip: client_ip.map(anonymize_ip),
            locale: resolve_locale(
                req.headers(),
                &config.supported_locales,
                &config.default_locale,
            ),
            cookies: Vec::new(),
        }
    }
}

/// Resolves the client address from proxy headers, falling back to the peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    IP_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name)?.to_str().ok())
        .find_map(|value| value.split(',').next()?.trim().parse::<IpAddr>().ok())
        .or(peer)
}

/// Zeroes the last IPv4 octet, or keeps the first 48 bits of an IPv6 address.
pub fn anonymize_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            Ipv4Addr::new(a, b, c, 0).to_string()
        }
        IpAddr::V6(v6) => {
            let s = v6.segments();
            Ipv6Addr::new(s[0], s[1], s[2], 0, 0, 0, 0, 0).to_string()
        }
    }
}

/// Picks the first `Accept-Language` tag whose primary subtag is supported.
pub fn resolve_locale(headers: &HeaderMap, supported: &[String], default: &str) -> String {
    headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .into_iter()
        .flat_map(|v| v.split(','))
        .filter_map(|tag| {
            let tag = tag.split(';').next()?.trim();
            let primary = tag.split('-').next()?.to_ascii_lowercase();
            supported.iter().find(|l| **l == primary).cloned()
        })
        .next()
        .unwrap_or_else(|| default.to_string())
}

//=========================================================================================
// Extractors
//=========================================================================================

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| AppError::Internal("route is not behind a pipeline".to_string()))
    }
}

/// The signed-in user. Rejects with 401 when there is none.
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_request_parts(parts, state).await?;
        ctx.user.map(CurrentUser).ok_or(AppError::Unauthorized)
    }
}

/// A signed-in user whose email is verified. 401 without a session, 403 when
/// the email is still unverified.
pub struct VerifiedUser(pub User);

impl<S> FromRequestParts<S> for VerifiedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.email_verified {
            Ok(VerifiedUser(user))
        } else {
            Err(AppError::Unverified)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn locales() -> Vec<String> {
        vec!["en".into(), "fr".into()]
    }

    #[test]
    fn proxy_headers_win_over_the_peer() {
        let peer = Some("10.0.0.1".parse().unwrap());
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer), peer);

        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 5.6.7.8"));
        assert_eq!(client_ip(&headers, peer), Some("1.2.3.4".parse().unwrap()));

        headers.insert("cf-connecting-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_ip(&headers, peer), Some("9.9.9.9".parse().unwrap()));
    }

    #[test]
    fn garbage_headers_are_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("not-an-ip"));
        headers.insert("x-real-ip", HeaderValue::from_static("4.4.4.4"));
        assert_eq!(client_ip(&headers, None), Some("4.4.4.4".parse().unwrap()));
    }

    #[test]
    fn anonymizes_both_families() {
        assert_eq!(anonymize_ip("203.0.113.77".parse().unwrap()), "203.0.113.0");
        assert_eq!(
            anonymize_ip("2001:db8:abcd:12:1:2:3:4".parse().unwrap()),
            "2001:db8:abcd::"
        );
    }

    #[test]
    fn locale_follows_accept_language() {
        let mut headers = HeaderMap::new();
        assert_eq!(resolve_locale(&headers, &locales(), "en"), "en");

        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("de-DE,fr-CA;q=0.8,en;q=0.5"),
        );
        assert_eq!(resolve_locale(&headers, &locales(), "en"), "fr");
    }
}
