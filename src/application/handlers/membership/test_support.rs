//! Test doubles shared by the membership handler tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::membership::PasswordHash;
use crate::ports::{ConfirmationSender, PasswordHasher, PurchaseConfirmation};

/// Deterministic, fast stand-in for the argon2 hasher.
pub struct StubHasher;

#[async_trait]
impl PasswordHasher for StubHasher {
    async fn hash(&self, password: &str) -> Result<PasswordHash, DomainError> {
        Ok(PasswordHash::new(format!("stub${}", password.len())))
    }

    async fn verify(&self, password: &str, hash: &PasswordHash) -> Result<bool, DomainError> {
        Ok(hash.as_str() == format!("stub${}", password.len()))
    }
}

/// Records confirmations; optionally fails every send.
#[derive(Clone, Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<PurchaseConfirmation>>>,
    fail: bool,
}

impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<PurchaseConfirmation> {
        self.sent.lock().unwrap().clone()
    }

    /// Waits for spawned confirmation tasks to run.
    pub async fn settle(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ConfirmationSender for RecordingSender {
    async fn send(&self, confirmation: PurchaseConfirmation) -> Result<(), DomainError> {
        if self.fail {
            return Err(DomainError::new(ErrorCode::InternalError, "mail relay down"));
        }
        self.sent.lock().unwrap().push(confirmation);
        Ok(())
    }
}
