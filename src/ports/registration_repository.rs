//! Event registration store port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, RegistrationId};
use crate::domain::registration::EventRegistration;

/// Repository port for paid event registrations.
#[async_trait]
pub trait RegistrationRepository: Send + Sync {
    /// Store a new registration.
    async fn insert(&self, registration: &EventRegistration) -> Result<(), DomainError>;

    /// Primary lookup used by the reconciler.
    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<EventRegistration>, DomainError>;

    /// Secondary lookup by the id embedded in intent metadata.
    async fn find_by_id(&self, id: &RegistrationId)
        -> Result<Option<EventRegistration>, DomainError>;

    /// Overwrite status, intent link and `updated_at`.
    ///
    /// # Errors
    ///
    /// - `RegistrationNotFound` if the registration doesn't exist
    async fn update(&self, registration: &EventRegistration) -> Result<(), DomainError>;
}
