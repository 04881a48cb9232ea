//! Stripe REST API objects.
//!
//! Only the fields the portal reads are modelled; Stripe adds fields freely
//! and unknown ones are ignored.

use serde::Deserialize;
use std::collections::HashMap;

use crate::ports::{Customer, PaymentErrorCode, PaymentIntent, PaymentIntentStatus};

// ════════════════════════════════════════════════════════════════════════════════
// Response Objects
// ════════════════════════════════════════════════════════════════════════════════

/// `customer` object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<StripeCustomer> for Customer {
    fn from(customer: StripeCustomer) -> Self {
        Customer {
            id: customer.id,
            email: customer.email,
            name: customer.name,
        }
    }
}

/// `payment_intent` object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub customer: Option<String>,
    pub status: PaymentIntentStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl From<StripePaymentIntent> for PaymentIntent {
    fn from(intent: StripePaymentIntent) -> Self {
        PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
            amount_cents: intent.amount,
            currency: intent.currency,
            customer_id: intent.customer,
            status: intent.status,
            metadata: intent.metadata,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════════

/// Error envelope returned with every non-2xx response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiError {
    /// `api_error`, `card_error`, `idempotency_error` or `invalid_request_error`.
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub decline_code: Option<String>,
}

/// Classifies a failed Stripe response.
///
/// HTTP status decides first; the error type refines 4xx responses.
pub fn classify_error(status: u16, error: Option<&StripeApiError>) -> PaymentErrorCode {
    match status {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        402 => PaymentErrorCode::CardDeclined,
        404 => PaymentErrorCode::NotFound,
        // Another request with the same idempotency key is in flight.
        409 => PaymentErrorCode::NetworkError,
        429 => PaymentErrorCode::RateLimitExceeded,
        500..=599 => PaymentErrorCode::NetworkError,
        _ => match error.map(|e| e.error_type.as_str()) {
            Some("card_error") => PaymentErrorCode::CardDeclined,
            Some("api_error") => PaymentErrorCode::ProviderError,
            _ => PaymentErrorCode::InvalidRequest,
        },
    }
}
