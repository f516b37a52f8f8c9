//! services/api/src/auth/redirect.rs
//!
//! Validation of client-supplied return URLs.

use url::Url;

/// Accepts absolute http(s) URLs pointing at the front end, an allowed host,
/// or a subdomain of the cookie apex domain.
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    app_url: Url,
    allowed_hosts: Vec<String>,
    apex_domain: Option<String>,
}

impl RedirectPolicy {
    pub fn new(app_url: Url, allowed_hosts: Vec<String>, apex_domain: Option<String>) -> Self {
        Self {
            app_url,
            allowed_hosts,
            apex_domain,
        }
    }

    pub fn is_allowed(&self, candidate: &Url) -> bool {
        if !matches!(candidate.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = candidate.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        if self.app_url.host_str() == Some(host.as_str()) {
            return true;
        }
        if self.allowed_hosts.iter().any(|allowed| *allowed == host) {
            return true;
        }
        match &self.apex_domain {
            Some(apex) => host == *apex || host.ends_with(&format!(".{apex}")),
            None => false,
        }
    }

    /// Parses and checks `candidate`; anything unusable yields `None`.
    pub fn validate(&self, candidate: Option<&str>) -> Option<Url> {
        let url = Url::parse(candidate?.trim()).ok()?;
        self.is_allowed(&url).then_some(url)
    }

    /// The validated candidate, or `path` on the front end.
    pub fn resolve(&self, candidate: Option<&str>, path: &str) -> Url {
        self.validate(candidate).unwrap_or_else(|| {
            self.app_url
                .join(path)
                .unwrap_or_else(|_| self.app_url.clone())
        })
    }
}
