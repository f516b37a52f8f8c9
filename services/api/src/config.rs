//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;
use url::Url;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Google OAuth client settings. Present only when all three variables are set.
#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

/// Cost parameters for the Argon2id password hash.
#[derive(Clone, Copy, Debug)]
pub struct PasswordCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for PasswordCost {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
        }
    }
}

/// Requests allowed per window for one route group.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitSettings {
    pub auth_max: u64,
    pub api_max: u64,
    pub window_secs: u64,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub production: bool,
    pub app_url: Url,
    pub cookie_domain: Option<String>,
    pub password_pepper: SecretString,
    pub password_cost: PasswordCost,
    pub google: Option<GoogleConfig>,
    pub resend_api_key: Option<SecretString>,
    pub mail_from: String,
    pub allowed_redirect_hosts: Vec<String>,
    pub rate_limits: RateLimitSettings,
    pub cache_ttl_secs: u64,
    pub image_dir: PathBuf,
    pub image_base_url: String,
    pub supported_locales: Vec<String>,
    pub default_locale: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8787".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required("DATABASE_URL")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let production = std::env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let app_url_str =
            std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let app_url = Url::parse(&app_url_str)
            .map_err(|e| ConfigError::InvalidValue("APP_URL".to_string(), e.to_string()))?;

        let cookie_domain = optional("COOKIE_DOMAIN")
            .map(|d| d.trim_start_matches('.').to_ascii_lowercase());

        // --- Load Secrets ---
        let password_pepper = SecretString::from(required("PASSWORD_PEPPER")?);
        let password_cost = PasswordCost {
            memory_kib: parsed("ARGON2_MEMORY_KIB", PasswordCost::default().memory_kib)?,
            iterations: parsed("ARGON2_ITERATIONS", PasswordCost::default().iterations)?,
        };

        let google = match (
            optional("GOOGLE_CLIENT_ID"),
            optional("GOOGLE_CLIENT_SECRET"),
            optional("GOOGLE_REDIRECT_URI"),
        ) {
            (Some(client_id), Some(secret), Some(redirect_uri)) => Some(GoogleConfig {
                client_id,
                client_secret: SecretString::from(secret),
                redirect_uri,
            }),
            _ => None,
        };

        let resend_api_key = optional("RESEND_API_KEY").map(SecretString::from);
        let mail_from = std::env::var("MAIL_FROM")
            .unwrap_or_else(|_| "CookStack <no-reply@cookstack.local>".to_string());

        // --- Load Request Handling Settings ---
        let allowed_redirect_hosts = list("ALLOWED_REDIRECT_HOSTS");
        let rate_limits = RateLimitSettings {
            auth_max: parsed("AUTH_RATE_LIMIT", 20)?,
            api_max: parsed("API_RATE_LIMIT", 300)?,
            window_secs: parsed("RATE_LIMIT_WINDOW_SECS", 60)?,
        };
        let cache_ttl_secs = parsed("CACHE_TTL_SECS", 60)?;

        let image_dir = std::env::var("IMAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./images"));
        let image_base_url = std::env::var("IMAGE_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8787/images".to_string());

        let mut supported_locales = list("SUPPORTED_LOCALES");
        if supported_locales.is_empty() {
            supported_locales = vec!["en".to_string(), "fr".to_string()];
        }
        let default_locale = std::env::var("DEFAULT_LOCALE").unwrap_or_else(|_| "en".to_string());
        if !supported_locales.contains(&default_locale) {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_LOCALE".to_string(),
                format!("'{}' is not one of SUPPORTED_LOCALES", default_locale),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            production,
            app_url,
            cookie_domain,
            password_pepper,
            password_cost,
            google,
            resend_api_key,
            mail_from,
            allowed_redirect_hosts,
            rate_limits,
            cache_ttl_secs,
            image_dir,
            image_base_url,
            supported_locales,
            default_locale,
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    optional(name).ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn list(name: &str) -> Vec<String> {
    optional(name)
        .map(|raw| {
            raw.split(',')
                .map(|item| item.trim().to_ascii_lowercase())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
