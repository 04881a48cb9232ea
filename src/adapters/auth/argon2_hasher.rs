//! Argon2id implementation of the PasswordHasher port.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, SaltString};
use argon2::{Argon2, PasswordHasher as _, PasswordVerifier as _};
use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::membership::PasswordHash;
use crate::ports::PasswordHasher;

/// Hashes with Argon2id default parameters on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct Argon2PasswordHasher;

impl Argon2PasswordHasher {
    pub fn new() -> Self {
        Self
    }
}

fn hashing_error(message: impl Into<String>) -> DomainError {
    DomainError::new(ErrorCode::InternalError, message)
}

#[async_trait]
impl PasswordHasher for Argon2PasswordHasher {
    async fn hash(&self, password: &str) -> Result<PasswordHash, DomainError> {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| PasswordHash::new(hash.to_string()))
                .map_err(|e| hashing_error(format!("password hashing failed: {}", e)))
        })
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking join error: {e}");
            hashing_error("password hashing task failed")
        })?
    }

    async fn verify(&self, password: &str, hash: &PasswordHash) -> Result<bool, DomainError> {
        let password = password.to_owned();
        let stored = hash.as_str().to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed = password_hash::PasswordHash::new(&stored)
                .map_err(|e| hashing_error(format!("invalid hash format: {}", e)))?;
            match Argon2::default().verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(password_hash::Error::Password) => Ok(false),
                Err(e) => Err(hashing_error(format!("verify error: {}", e))),
            }
        })
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking join error: {e}");
            hashing_error("password verification task failed")
        })?
    }
}
