//! services/api/src/auth/password.rs
//!
//! Argon2id password hashing with a server-side secret (pepper).

use crate::config::{ConfigError, PasswordCost};
use crate::error::AppError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::error;

#[derive(Clone)]
pub struct PasswordService {
    pepper: SecretString,
    params: Params,
}

impl PasswordService {
    pub fn new(pepper: SecretString, cost: PasswordCost) -> Result<Self, ConfigError> {
        let params = Params::new(cost.memory_kib, cost.iterations, 1, None).map_err(|e| {
            ConfigError::InvalidValue("ARGON2_MEMORY_KIB/ARGON2_ITERATIONS".to_string(), e.to_string())
        })?;
        Ok(Self { pepper, params })
    }

    fn argon2(&self) -> Result<Argon2<'_>, AppError> {
        Argon2::new_with_secret(
            self.pepper.expose_secret().as_bytes(),
            Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
        .map_err(|e| AppError::Internal(format!("Failed to build password hasher: {e}")))
    }

    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
    }

    /// Checks `password` against a stored PHC string. The comparison inside
    /// argon2 is constant-time.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, AppError> {
        let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| {
            error!("Failed to parse password hash: {:?}", e);
            AppError::Internal("Stored password hash is malformed".to_string())
        })?;
        Ok(self
            .argon2()?
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}
