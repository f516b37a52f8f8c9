//! services/api/src/adapters/google.rs
//!
//! Google as an OAuth 2.0 / OpenID Connect provider: authorization URLs with
//! PKCE (S256), the authorization-code exchange and the userinfo lookup.

use crate::auth::tokens::pkce_challenge;
use crate::config::GoogleConfig;
use async_trait::async_trait;
use cookstack_core::ports::{OAuthProvider, OAuthTokens, PortError, PortResult};
use cookstack_core::OAuthProfile;
use secrecy::ExposeSecret;
use serde::Deserialize;

const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid profile email";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: Option<String>,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

pub struct GoogleOAuth {
    client: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleOAuth {
    pub fn new(client: reqwest::Client, config: GoogleConfig) -> Self {
        Self { client, config }
    }
}

fn provider_error(e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(format!("google: {}", e))
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    fn provider_id(&self) -> &str {
        "google"
    }

    fn authorization_url(&self, state: &str, code_verifier: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", SCOPES)
            .append_pair("state", state)
            .append_pair("code_challenge", &pkce_challenge(code_verifier))
            .append_pair("code_challenge_method", "S256")
            .finish();
        format!("{}?{}", AUTHORIZATION_ENDPOINT, query)
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> PortResult<OAuthTokens> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(&form)
            .send()
            .await
            .map_err(provider_error)?;
        if !response.status().is_success() {
            return Err(provider_error(format!(
                "token endpoint answered {}",
                response.status()
            )));
        }

        let tokens: TokenResponse = response.json().await.map_err(provider_error)?;
        Ok(OAuthTokens {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
        })
    }

    async fn fetch_profile(&self, tokens: &OAuthTokens) -> PortResult<OAuthProfile> {
        let response = self
            .client
            .get(USERINFO_ENDPOINT)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(provider_error)?;
        if !response.status().is_success() {
            return Err(provider_error(format!(
                "userinfo endpoint answered {}",
                response.status()
            )));
        }

        let info: UserInfo = response.json().await.map_err(provider_error)?;
        let email = info
            .email
            .ok_or_else(|| provider_error("profile has no email"))?;
        Ok(OAuthProfile {
            provider_user_id: info.sub,
            email,
            email_verified: info.email_verified,
            name: info.name,
            picture: info.picture,
        })
    }
}
