//! HTTP handlers for membership endpoints.
//!
//! These handlers connect Axum routes to application layer command handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::{
    BeginPurchaseHandler, FinalizePurchaseHandler, HandlePaymentWebhookCommand,
    HandlePaymentWebhookHandler, KeyedLocks,
};
use crate::domain::membership::{MembershipError, PricingResolver, WebhookError};
use crate::ports::{
    ConfirmationSender, MemberRepository, PasswordHasher, PaymentProvider,
    RegistrationRepository, WebhookEventRepository,
};

use super::dto::{
    BeginPurchaseRequest, BeginPurchaseResponse, ErrorResponse, FinalizePurchaseRequest,
    FinalizePurchaseResponse, HealthResponse, WebhookAckResponse,
};

const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// This struct is cloned for each request and contains Arc-wrapped dependencies
/// for efficient sharing across handlers. `locks` is shared by finalize and the
/// webhook so both serialize on the same member.
#[derive(Clone)]
pub struct MembershipAppState {
    pub members: Arc<dyn MemberRepository>,
    pub registrations: Arc<dyn RegistrationRepository>,
    pub processed_events: Arc<dyn WebhookEventRepository>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub confirmations: Arc<dyn ConfirmationSender>,
    pub pricing: Arc<PricingResolver>,
    pub locks: KeyedLocks,
    pub require_livemode: bool,
}

impl MembershipAppState {
    /// Create handlers on demand from the shared state.
    pub fn begin_purchase_handler(&self) -> BeginPurchaseHandler {
        BeginPurchaseHandler::new(
            self.members.clone(),
            self.payment_provider.clone(),
            self.pricing.clone(),
        )
    }

    pub fn finalize_purchase_handler(&self) -> FinalizePurchaseHandler {
        FinalizePurchaseHandler::new(
            self.members.clone(),
            self.payment_provider.clone(),
            self.password_hasher.clone(),
            self.confirmations.clone(),
            self.pricing.clone(),
            self.locks.clone(),
        )
    }

    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(
            self.payment_provider.clone(),
            self.members.clone(),
            self.registrations.clone(),
            self.processed_events.clone(),
            self.confirmations.clone(),
            self.pricing.clone(),
            self.locks.clone(),
        )
        .with_livemode_required(self.require_livemode)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/membership/purchase - Create the customer and payment intent
pub async fn begin_purchase(
    State(state): State<MembershipAppState>,
    payload: Result<Json<BeginPurchaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MembershipApiError> {
    let Json(request) = payload.map_err(body_error)?;

    let result = state
        .begin_purchase_handler()
        .handle(request.into())
        .await?;

    Ok((StatusCode::CREATED, Json(BeginPurchaseResponse::from(result))))
}

/// POST /api/membership/finalize - Verify the payment and write the member
pub async fn finalize_purchase(
    State(state): State<MembershipAppState>,
    payload: Result<Json<FinalizePurchaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MembershipApiError> {
    let Json(request) = payload.map_err(body_error)?;

    let result = state
        .finalize_purchase_handler()
        .handle(request.into())
        .await?;

    Ok(Json(FinalizePurchaseResponse::from(result)))
}

/// POST /api/webhooks/stripe - Handle Stripe webhook events
///
/// The body is taken as raw bytes; the signature covers the exact payload.
pub async fn handle_stripe_webhook(
    State(state): State<MembershipAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    let cmd = HandlePaymentWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    state.webhook_handler().handle(cmd).await?;

    Ok(Json(WebhookAckResponse { received: true }))
}

/// GET /health - Liveness
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn body_error(rejection: JsonRejection) -> MembershipError {
    MembershipError::validation("body", rejection.body_text())
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts membership errors to HTTP responses.
#[derive(Debug)]
pub struct MembershipApiError(MembershipError);

impl From<MembershipError> for MembershipApiError {
    fn from(err: MembershipError) -> Self {
        Self(err)
    }
}

impl MembershipApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            MembershipError::InvalidRole(_) | MembershipError::ValidationFailed { .. } => {
                StatusCode::BAD_REQUEST
            }
            MembershipError::MemberNotFound(_) => StatusCode::NOT_FOUND,
            MembershipError::DuplicateMember(_) | MembershipError::PaymentMismatch { .. } => {
                StatusCode::CONFLICT
            }
            MembershipError::PaymentNotCompleted { .. }
            | MembershipError::PaymentDeclined { .. } => StatusCode::PAYMENT_REQUIRED,
            MembershipError::PaymentSetup { .. } => StatusCode::BAD_GATEWAY,
            MembershipError::PaymentProviderUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            MembershipError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MembershipApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self.0 {
            MembershipError::Infrastructure(detail) => {
                tracing::error!(error = %detail, "Membership request failed");
                "An internal error occurred. Please try again.".to_string()
            }
            other => other.message(),
        };
        let body = ErrorResponse::new(self.0.code().to_string(), message);
        (status, Json(body)).into_response()
    }
}

/// API error type for the webhook endpoint.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        if status == StatusCode::OK {
            return (status, Json(WebhookAckResponse { received: true })).into_response();
        }

        let (code, message) = if self.0.is_rejection() {
            ("INVALID_SIGNATURE", self.0.to_string())
        } else if self.0.is_retryable() {
            ("WEBHOOK_PROCESSING_FAILED", "Webhook processing failed".to_string())
        } else {
            ("INVALID_PAYLOAD", self.0.to_string())
        };
        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
