//! Paid event registrations.
//!
//! Event registrations share the Stripe plumbing with memberships but are a
//! separate purchase flow. The reconciler only ever moves their status.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{RegistrationId, Timestamp};
use crate::domain::membership::Email;

/// Payment state of an event registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Completed,
    Failed,
    Canceled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Completed => "completed",
            RegistrationStatus::Failed => "failed",
            RegistrationStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RegistrationStatus::Pending),
            "completed" => Some(RegistrationStatus::Completed),
            "failed" => Some(RegistrationStatus::Failed),
            "canceled" => Some(RegistrationStatus::Canceled),
            _ => None,
        }
    }
}

/// A paid registration for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRegistration {
    pub id: RegistrationId,
    pub event_name: String,
    pub email: Email,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_intent_id: Option<String>,
    pub status: RegistrationStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EventRegistration {
    pub fn pending(
        event_name: impl Into<String>,
        email: Email,
        amount_cents: i64,
        currency: impl Into<String>,
        payment_intent_id: Option<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: RegistrationId::new(),
            event_name: event_name.into(),
            email,
            amount_cents,
            currency: currency.into(),
            payment_intent_id,
            status: RegistrationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the status to `target`.
    ///
    /// Returns `false` when nothing changed: the status already equals
    /// `target`, or the registration is completed and `target` would undo
    /// that.
    pub fn settle(&mut self, target: RegistrationStatus) -> bool {
        if self.status == target {
            return false;
        }
        if self.status == RegistrationStatus::Completed {
            return false;
        }
        self.status = target;
        self.updated_at = Timestamp::now();
        true
    }

    /// Links the registration to the intent that paid for it.
    pub fn link_payment_intent(&mut self, payment_intent_id: &str) {
        if self.payment_intent_id.as_deref() != Some(payment_intent_id) {
            self.payment_intent_id = Some(payment_intent_id.to_string());
            self.updated_at = Timestamp::now();
        }
    }
}
