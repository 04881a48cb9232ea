//! Purchase confirmation port.
//!
//! Delivery is fire-and-forget from the orchestrator's point of view: errors
//! are logged by the caller and never fail the purchase.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, MemberId, Timestamp};
use crate::domain::membership::{Email, MemberRole};

/// What was purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationKind {
    Registration,
    Renewal,
}

/// Content of a purchase confirmation.
#[derive(Debug, Clone)]
pub struct PurchaseConfirmation {
    pub member_id: MemberId,
    pub email: Email,
    pub name: String,
    pub role: MemberRole,
    pub kind: ConfirmationKind,
    pub amount_cents: i64,
    pub currency: String,
    pub membership_expiry: Timestamp,
}

#[async_trait]
pub trait ConfirmationSender: Send + Sync {
    async fn send(&self, confirmation: PurchaseConfirmation) -> Result<(), DomainError>;
}
