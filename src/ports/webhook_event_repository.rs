//! Processed webhook event log.
//!
//! Stripe redelivers on timeouts and on any non-2xx response, so the same
//! event id can arrive many times. The reconciler records an event only after
//! it was applied or deliberately ignored; failed events stay unrecorded so a
//! redelivery gets another attempt.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;

/// How a recorded event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    Ignored,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "processed",
            WebhookOutcome::Ignored => "ignored",
        }
    }
}

/// Record of a handled webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    /// Stripe event ID (evt_xxx format).
    pub event_id: String,

    /// Type of Stripe event (e.g., "invoice.payment_succeeded").
    pub event_type: String,

    pub outcome: WebhookOutcome,

    /// Why the event was ignored, if it was.
    pub note: Option<String>,

    pub processed_at: DateTime<Utc>,
}

impl WebhookEventRecord {
    pub fn processed(event_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            outcome: WebhookOutcome::Processed,
            note: None,
            processed_at: Utc::now(),
        }
    }

    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            outcome: WebhookOutcome::Ignored,
            note: Some(reason.into()),
            processed_at: Utc::now(),
        }
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this event).
    Inserted,
    /// Record already exists (duplicate event).
    AlreadyExists,
}

/// Port for the processed-event log.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Returns true if the event was already handled.
    async fn contains(&self, event_id: &str) -> Result<bool, DomainError>;

    /// Record a handled event with `ON CONFLICT DO NOTHING` semantics.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;
}
