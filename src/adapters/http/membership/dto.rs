//! HTTP DTOs (Data Transfer Objects) for membership endpoints.
//!
//! These types define the JSON request/response structure for the membership API.
//! They serve as the boundary between HTTP and the application layer.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::application::{
    BeginPurchaseCommand, BeginPurchaseResult, FinalizePurchaseCommand, FinalizePurchaseResult,
    FinalizeOutcome, PurchaseProfile,
};
use crate::domain::membership::{format_cents, BillingAddress, MemberProfile};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a membership purchase.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginPurchaseRequest {
    pub role: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bcba_number: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
    #[serde(default)]
    pub billing_name: Option<String>,
    #[serde(default)]
    pub billing_address: Option<BillingAddress>,
    #[serde(default)]
    pub is_renewal: bool,
}

impl From<BeginPurchaseRequest> for BeginPurchaseCommand {
    fn from(req: BeginPurchaseRequest) -> Self {
        Self {
            role: req.role,
            profile: PurchaseProfile {
                name: req.name,
                email: req.email,
                phone: req.phone,
                bcba_number: req.bcba_number,
                affiliation: req.affiliation,
                billing_name: req.billing_name,
                billing_address: req.billing_address,
            },
            is_renewal: req.is_renewal,
        }
    }
}

/// Request to finalize a purchase after the browser confirmed the payment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizePurchaseRequest {
    pub payment_intent_id: String,
    pub email: String,
    #[serde(default)]
    pub is_renewal: bool,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub secondary_name: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bcba_number: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
    #[serde(default)]
    pub billing_name: Option<String>,
    #[serde(default)]
    pub billing_address: Option<BillingAddress>,
}

impl From<FinalizePurchaseRequest> for FinalizePurchaseCommand {
    fn from(req: FinalizePurchaseRequest) -> Self {
        Self {
            payment_intent_id: req.payment_intent_id,
            email: req.email,
            is_renewal: req.is_renewal,
            role: req.role,
            name: req.name,
            secondary_name: req.secondary_name,
            profile: MemberProfile {
                phone: req.phone,
                bcba_number: req.bcba_number,
                affiliation: req.affiliation,
                billing_name: req.billing_name,
                billing_address: req.billing_address,
            },
            password: req.password,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// What the browser needs to confirm the payment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginPurchaseResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub customer_id: String,
    pub amount_cents: i64,
    pub currency: String,
    /// Major units, e.g. `"50.00"`.
    pub display_amount: String,
}

impl From<BeginPurchaseResult> for BeginPurchaseResponse {
    fn from(result: BeginPurchaseResult) -> Self {
        Self {
            display_amount: format_cents(result.amount_cents),
            client_secret: result.client_secret,
            payment_intent_id: result.payment_intent_id,
            customer_id: result.customer_id,
            amount_cents: result.amount_cents,
            currency: result.currency,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizePurchaseResponse {
    pub success: bool,
    pub member_id: String,
    /// `created` or `renewed`.
    pub status: &'static str,
    pub message: String,
    pub already_applied: bool,
    /// RFC 3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_expiry: Option<String>,
}

impl From<FinalizePurchaseResult> for FinalizePurchaseResponse {
    fn from(result: FinalizePurchaseResult) -> Self {
        let message = match result.outcome {
            FinalizeOutcome::Created => "Membership created successfully",
            FinalizeOutcome::Renewed => "Membership renewed successfully",
        };
        Self {
            success: true,
            member_id: result.member_id.to_string(),
            status: result.outcome.as_str(),
            message: message.to_string(),
            already_applied: result.already_applied,
            membership_expiry: result
                .membership_expiry
                .map(|t| t.as_datetime().to_rfc3339()),
        }
    }
}

/// Acknowledgement returned to Stripe.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}
