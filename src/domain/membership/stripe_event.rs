//! Stripe webhook event types.
//!
//! Only fields relevant to reconciliation are captured; everything else in
//! Stripe's schema is ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stripe webhook event (simplified).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "payment_intent.succeeded").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    pub created: i64,

    /// Object containing event-specific data.
    pub data: StripeEventData,

    /// Whether this is a live mode event (vs test mode).
    #[serde(default)]
    pub livemode: bool,

    /// API version used to render this event.
    #[serde(default)]
    pub api_version: Option<String>,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,

    /// Previous values for updated attributes (only for update events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl StripeEvent {
    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }

    /// Parse the event type into a known enum variant.
    pub fn parsed_type(&self) -> StripeEventType {
        StripeEventType::parse(&self.event_type)
    }
}

/// Event kinds the reconciler dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeEventType {
    CustomerSubscriptionCreated,
    CustomerSubscriptionUpdated,
    CustomerSubscriptionDeleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    PaymentIntentCreated,
    PaymentIntentSucceeded,
    PaymentIntentPaymentFailed,
    PaymentIntentCanceled,
    /// Unknown or unhandled event type.
    Unknown,
}

impl StripeEventType {
    /// Parse event type from string.
    ///
    /// `invoice.paid` is treated like `invoice.payment_succeeded`.
    pub fn parse(s: &str) -> Self {
        match s {
            "customer.subscription.created" => Self::CustomerSubscriptionCreated,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            "invoice.payment_succeeded" | "invoice.paid" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "payment_intent.created" => Self::PaymentIntentCreated,
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentIntentPaymentFailed,
            "payment_intent.canceled" => Self::PaymentIntentCanceled,
            _ => Self::Unknown,
        }
    }

    /// Convert to the Stripe event type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerSubscriptionCreated => "customer.subscription.created",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::PaymentIntentCreated => "payment_intent.created",
            Self::PaymentIntentSucceeded => "payment_intent.succeeded",
            Self::PaymentIntentPaymentFailed => "payment_intent.payment_failed",
            Self::PaymentIntentCanceled => "payment_intent.canceled",
            Self::Unknown => "unknown",
        }
    }
}

/// `data.object` of `customer.subscription.*` events.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// `data.object` of `invoice.*` events.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvoiceObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub currency: String,
}

/// `data.object` of `payment_intent.*` events.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentIntentObject {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub customer: Option<String>,
    pub status: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn event_with(event_type: &str, object: Value) -> StripeEvent {
        serde_json::from_value(json!({
            "id": "evt_fixture",
            "type": event_type,
            "created": 1_767_225_600,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn deserialize_minimal_event() {
        let json = r#"{
            "id": "evt_1234567890",
            "type": "payment_intent.succeeded",
            "created": 1704067200,
            "data": { "object": {} },
            "livemode": false,
            "api_version": "2023-10-16"
        }"#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.id, "evt_1234567890");
        assert_eq!(event.parsed_type(), StripeEventType::PaymentIntentSucceeded);
        assert_eq!(event.created, 1704067200);
    }

    #[test]
    fn null_api_version_is_accepted() {
        let json = r#"{
            "id": "evt_1", "type": "invoice.paid", "created": 1,
            "data": { "object": {} }, "api_version": null
        }"#;
        let event: StripeEvent = serde_json::from_str(json).unwrap();
        assert!(event.api_version.is_none());
        assert_eq!(event.parsed_type(), StripeEventType::InvoicePaymentSucceeded);
    }

    #[test]
    fn payment_intent_object_reads_metadata() {
        let event = event_with(
            "payment_intent.succeeded",
            json!({
                "id": "pi_1",
                "amount": 5000,
                "currency": "usd",
                "customer": "cus_1",
                "status": "succeeded",
                "metadata": { "purpose": "membership", "email": "a@b.co" }
            }),
        );

        let intent: PaymentIntentObject = event.deserialize_object().unwrap();
        assert_eq!(intent.amount, 5000);
        assert_eq!(intent.metadata.get("purpose").map(String::as_str), Some("membership"));
    }

    #[test]
    fn subscription_object_defaults_optional_fields() {
        let event = event_with(
            "customer.subscription.updated",
            json!({ "id": "sub_1", "customer": "cus_1", "status": "active" }),
        );

        let sub: SubscriptionObject = event.deserialize_object().unwrap();
        assert!(!sub.cancel_at_period_end);
        assert!(sub.current_period_end.is_none());
    }

    #[test]
    fn invoice_object_requires_currency() {
        let event = event_with("invoice.paid", json!({ "id": "in_1", "amount_paid": 5000 }));
        assert!(event.deserialize_object::<InvoiceObject>().is_err());
    }

    #[test]
    fn event_type_as_str_roundtrip() {
        let types = [
            StripeEventType::CustomerSubscriptionCreated,
            StripeEventType::CustomerSubscriptionUpdated,
            StripeEventType::CustomerSubscriptionDeleted,
            StripeEventType::InvoicePaymentSucceeded,
            StripeEventType::InvoicePaymentFailed,
            StripeEventType::PaymentIntentCreated,
            StripeEventType::PaymentIntentSucceeded,
            StripeEventType::PaymentIntentPaymentFailed,
            StripeEventType::PaymentIntentCanceled,
        ];

        for event_type in types {
            assert_eq!(StripeEventType::parse(event_type.as_str()), event_type);
        }
    }

    #[test]
    fn unknown_types_map_to_unknown() {
        assert_eq!(StripeEventType::parse("charge.refunded"), StripeEventType::Unknown);
    }
}
