//! Payment history entries.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::Timestamp;

/// Outcome recorded for a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Completed,
    Failed,
    Pending,
}

/// Provider object a payment record refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentReference {
    /// One-off charge, e.g. a membership purchase or renewal.
    PaymentIntentId(String),
    /// Subscription invoice.
    InvoiceId(String),
}

impl PaymentReference {
    pub fn payment_intent(id: impl Into<String>) -> Self {
        PaymentReference::PaymentIntentId(id.into())
    }

    pub fn invoice(id: impl Into<String>) -> Self {
        PaymentReference::InvoiceId(id.into())
    }

    pub fn id(&self) -> &str {
        match self {
            PaymentReference::PaymentIntentId(id) | PaymentReference::InvoiceId(id) => id,
        }
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentReference::PaymentIntentId(id) => write!(f, "payment_intent:{}", id),
            PaymentReference::InvoiceId(id) => write!(f, "invoice:{}", id),
        }
    }
}

/// One entry in a member's payment audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentRecordStatus,
    pub date: Timestamp,
    pub reference: PaymentReference,
}

impl PaymentRecord {
    pub fn completed(
        reference: PaymentReference,
        amount_cents: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            amount_cents,
            currency: currency.into(),
            status: PaymentRecordStatus::Completed,
            date: Timestamp::now(),
            reference,
        }
    }

    pub fn failed(
        reference: PaymentReference,
        amount_cents: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            amount_cents,
            currency: currency.into(),
            status: PaymentRecordStatus::Failed,
            date: Timestamp::now(),
            reference,
        }
    }

    /// Two records describe the same payment outcome.
    pub fn same_outcome(&self, other: &PaymentRecord) -> bool {
        self.reference == other.reference && self.status == other.status
    }
}
