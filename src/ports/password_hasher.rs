//! Password hashing port.
//!
//! Credentials belong to the auth collaborator; the membership flow only
//! asks it to turn a plaintext password into an opaque hash.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::membership::PasswordHash;

#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password.
    ///
    /// Implementations should move CPU-heavy work off the async executor.
    async fn hash(&self, password: &str) -> Result<PasswordHash, DomainError>;

    /// Check a plaintext password against a stored hash.
    async fn verify(&self, password: &str, hash: &PasswordHash) -> Result<bool, DomainError>;
}
