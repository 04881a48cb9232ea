//! Member aggregate.
//!
//! A member is created only after a verified successful charge and is
//! mutated afterwards by renewals and provider webhooks.
//!
//! # Invariants
//!
//! - `email` is unique across members (enforced by the store)
//! - `payment_history` is append-only; a `(reference, status)` pair
//!   appears at most once
//! - `version` increases by one on every persisted update

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{MemberId, Timestamp};

use super::{
    Email, MemberRole, MembershipStatus, PaymentRecord, PaymentRecordStatus, PaymentReference,
    SubscriptionStatus,
};

/// Opaque password hash produced by the auth collaborator.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash([REDACTED])")
    }
}

/// Postal address used for billing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAddress {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Contact and billing details. Opaque to the payment flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    pub phone: Option<String>,
    pub bcba_number: Option<String>,
    pub affiliation: Option<String>,
    pub billing_name: Option<String>,
    pub billing_address: Option<BillingAddress>,
}

/// Everything needed to register a brand-new member.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub email: Email,
    pub name: String,
    pub secondary_name: Option<String>,
    pub password_hash: PasswordHash,
    pub role: MemberRole,
    pub profile: MemberProfile,
    pub stripe_customer_id: Option<String>,
}

/// Member aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub email: Email,
    pub name: String,
    pub secondary_name: Option<String>,
    pub password_hash: PasswordHash,
    pub role: MemberRole,
    pub membership_status: MembershipStatus,
    pub membership_expiry: Option<Timestamp>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub profile: MemberProfile,
    /// Written directly only by storage adapters rehydrating a row.
    pub(crate) payment_history: Vec<PaymentRecord>,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Member {
    /// Builds an active member from a verified first payment.
    pub fn register(new: NewMember, expiry: Timestamp, first_payment: PaymentRecord) -> Self {
        let now = Timestamp::now();
        Self {
            id: MemberId::new(),
            email: new.email,
            name: new.name,
            secondary_name: new.secondary_name,
            password_hash: new.password_hash,
            role: new.role,
            membership_status: MembershipStatus::Active,
            membership_expiry: Some(expiry),
            subscription_status: None,
            stripe_customer_id: new.stripe_customer_id,
            stripe_subscription_id: None,
            profile: new.profile,
            payment_history: vec![first_payment],
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn payment_history(&self) -> &[PaymentRecord] {
        &self.payment_history
    }

    /// Returns true if a record for `reference` with `status` exists.
    pub fn has_payment(&self, reference: &PaymentReference, status: PaymentRecordStatus) -> bool {
        self.payment_history
            .iter()
            .any(|record| &record.reference == reference && record.status == status)
    }

    /// Returns true if the referenced payment was already applied.
    pub fn has_completed_payment(&self, reference: &PaymentReference) -> bool {
        self.has_payment(reference, PaymentRecordStatus::Completed)
    }

    /// Appends `record` unless the same outcome is already recorded.
    ///
    /// Returns whether the record was appended.
    pub fn record_payment(&mut self, record: PaymentRecord) -> bool {
        if self.payment_history.iter().any(|r| r.same_outcome(&record)) {
            return false;
        }
        self.payment_history.push(record);
        self.touch();
        true
    }

    /// Applies a verified renewal payment.
    ///
    /// Returns `false` without changing anything if the payment was already
    /// applied.
    pub fn renew(
        &mut self,
        role: MemberRole,
        expiry: Timestamp,
        stripe_customer_id: Option<String>,
        payment: PaymentRecord,
    ) -> bool {
        if self.has_completed_payment(&payment.reference) {
            return false;
        }
        self.role = role;
        self.membership_status = MembershipStatus::Active;
        self.membership_expiry = Some(expiry);
        if stripe_customer_id.is_some() {
            self.stripe_customer_id = stripe_customer_id;
        }
        self.record_payment(payment)
    }

    /// Mirrors a provider subscription state onto the member.
    ///
    /// `active_expiry` is used only when the subscription is active; it is
    /// set, not added to the current expiry.
    pub fn apply_subscription(
        &mut self,
        subscription_id: &str,
        status: SubscriptionStatus,
        cancel_at_period_end: bool,
        active_expiry: Timestamp,
    ) {
        self.stripe_subscription_id = Some(subscription_id.to_string());
        self.subscription_status = Some(status);
        match status {
            SubscriptionStatus::Active if cancel_at_period_end => {
                self.membership_status = MembershipStatus::Canceling;
            }
            SubscriptionStatus::Active => {
                self.membership_status = MembershipStatus::Active;
                self.membership_expiry = Some(active_expiry);
            }
            SubscriptionStatus::Paused => self.membership_status = MembershipStatus::Paused,
            SubscriptionStatus::Unpaid | SubscriptionStatus::Canceled => {
                self.membership_status = MembershipStatus::Inactive;
            }
            SubscriptionStatus::PastDue => {}
        }
        self.touch();
    }

    /// The provider subscription was deleted.
    pub fn end_subscription(&mut self) {
        self.membership_status = MembershipStatus::Inactive;
        self.subscription_status = Some(SubscriptionStatus::Canceled);
        self.stripe_subscription_id = None;
        self.touch();
    }

    /// A subscription invoice failed to collect.
    pub fn mark_past_due(&mut self) {
        self.subscription_status = Some(SubscriptionStatus::PastDue);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}
