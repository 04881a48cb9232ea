//! In-memory event registration store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, RegistrationId};
use crate::domain::registration::EventRegistration;
use crate::ports::RegistrationRepository;

#[derive(Clone, Default)]
pub struct InMemoryRegistrationRepository {
    registrations: Arc<RwLock<HashMap<RegistrationId, EventRegistration>>>,
}

impl InMemoryRegistrationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistrationRepository for InMemoryRegistrationRepository {
    async fn insert(&self, registration: &EventRegistration) -> Result<(), DomainError> {
        self.registrations
            .write()
            .await
            .insert(registration.id, registration.clone());
        Ok(())
    }

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<EventRegistration>, DomainError> {
        let registrations = self.registrations.read().await;
        Ok(registrations
            .values()
            .find(|r| r.payment_intent_id.as_deref() == Some(payment_intent_id))
            .cloned())
    }

    async fn find_by_id(
        &self,
        id: &RegistrationId,
    ) -> Result<Option<EventRegistration>, DomainError> {
        Ok(self.registrations.read().await.get(id).cloned())
    }

    async fn update(&self, registration: &EventRegistration) -> Result<(), DomainError> {
        let mut registrations = self.registrations.write().await;
        match registrations.get_mut(&registration.id) {
            Some(stored) => {
                *stored = registration.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::RegistrationNotFound,
                format!("Registration {} not found", registration.id),
            )),
        }
    }
}
