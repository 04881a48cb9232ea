//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` trait against the Stripe REST API.
//! Requests are form-encoded, authenticated with the secret key, and carry
//! an `Idempotency-Key` header when the caller supplies one.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, webhook_secret);
//! let adapter = StripePaymentAdapter::new(config)?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::domain::membership::{BillingAddress, StripeEvent, StripeWebhookVerifier, WebhookError};
use crate::ports::{
    CreateCustomerRequest, CreatePaymentIntentRequest, Customer, PaymentError, PaymentErrorCode,
    PaymentIntent, PaymentProvider,
};

use super::api_types::{classify_error, StripeCustomer, StripeErrorResponse, StripePaymentIntent};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Per-request timeout.
    timeout: Duration,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self::from_secrets(
            SecretString::new(api_key.into()),
            SecretString::new(webhook_secret.into()),
        )
    }

    pub fn from_secrets(api_key: SecretString, webhook_secret: SecretString) -> Self {
        Self {
            api_key,
            webhook_secret,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Stripe payment provider adapter.
///
/// Never retries on its own; see `PaymentErrorCode::is_retryable`.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    verifier: StripeWebhookVerifier,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::provider(format!("Failed to build HTTP client: {}", e)))?;
        let verifier = StripeWebhookVerifier::new(config.webhook_secret.clone());

        Ok(Self {
            config,
            verifier,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base_url, path)
    }

    /// Sends a form-encoded POST and decodes the response.
    async fn post_form<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        params: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, PaymentError> {
        let mut request = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await.map_err(transport_error)?;
        decode_response(operation, response).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> Result<T, PaymentError> {
        let response = self
            .http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(transport_error)?;
        decode_response(operation, response).await
    }
}

fn transport_error(err: reqwest::Error) -> PaymentError {
    if err.is_timeout() {
        PaymentError::network(format!("Stripe request timed out: {}", err))
    } else {
        PaymentError::network(err.to_string())
    }
}

async fn decode_response<T: DeserializeOwned>(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<T, PaymentError> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        });
    }

    let body = response.text().await.unwrap_or_default();
    let api_error = serde_json::from_str::<StripeErrorResponse>(&body)
        .ok()
        .map(|r| r.error);
    let code = classify_error(status.as_u16(), api_error.as_ref());
    let message = api_error
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| format!("Stripe returned HTTP {}", status.as_u16()));

    tracing::warn!(
        operation,
        status = status.as_u16(),
        code = %code,
        stripe_code = api_error.as_ref().and_then(|e| e.code.as_deref()),
        "Stripe request failed"
    );

    let mut error = PaymentError::new(code, message);
    if let Some(provider_code) = api_error.and_then(|e| e.decline_code.or(e.code)) {
        error = error.with_provider_code(provider_code);
    }
    Err(error)
}

// ════════════════════════════════════════════════════════════════════════════════
// Form Encoding
// ════════════════════════════════════════════════════════════════════════════════

fn push_metadata(params: &mut Vec<(String, String)>, metadata: &HashMap<String, String>) {
    let mut keys: Vec<_> = metadata.keys().collect();
    keys.sort();
    for key in keys {
        params.push((format!("metadata[{}]", key), metadata[key].clone()));
    }
}

fn push_address(params: &mut Vec<(String, String)>, address: &BillingAddress) {
    let fields = [
        ("line1", &address.line1),
        ("line2", &address.line2),
        ("city", &address.city),
        ("state", &address.state),
        ("postal_code", &address.postal_code),
        ("country", &address.country),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            params.push((format!("address[{}]", name), value.clone()));
        }
    }
}

fn customer_params(request: &CreateCustomerRequest) -> Vec<(String, String)> {
    let mut params = vec![("email".to_string(), request.email.clone())];
    if let Some(name) = &request.name {
        params.push(("name".to_string(), name.clone()));
    }
    if let Some(phone) = &request.phone {
        params.push(("phone".to_string(), phone.clone()));
    }
    if let Some(address) = &request.address {
        push_address(&mut params, address);
    }
    push_metadata(&mut params, &request.metadata);
    params
}

fn payment_intent_params(request: &CreatePaymentIntentRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("amount".to_string(), request.amount_cents.to_string()),
        ("currency".to_string(), request.currency.to_lowercase()),
        ("customer".to_string(), request.customer_id.clone()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];
    if let Some(description) = &request.description {
        params.push(("description".to_string(), description.clone()));
    }
    push_metadata(&mut params, &request.metadata);
    params
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let customer: StripeCustomer = self
            .post_form(
                "create_customer",
                "customers",
                &customer_params(&request),
                request.idempotency_key.as_deref(),
            )
            .await?;

        tracing::debug!(customer_id = %customer.id, "Stripe customer created");
        Ok(customer.into())
    }

    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        if request.amount_cents <= 0 {
            return Err(PaymentError::invalid_request("amount must be positive"));
        }

        let intent: StripePaymentIntent = self
            .post_form(
                "create_payment_intent",
                "payment_intents",
                &payment_intent_params(&request),
                request.idempotency_key.as_deref(),
            )
            .await?;

        tracing::debug!(
            payment_intent_id = %intent.id,
            amount = intent.amount,
            "Stripe payment intent created"
        );
        Ok(intent.into())
    }

    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let well_formed = intent_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if intent_id.is_empty() || !well_formed {
            return Err(PaymentError::new(
                PaymentErrorCode::InvalidRequest,
                "malformed payment intent id",
            ));
        }

        let intent: StripePaymentIntent = self
            .get(
                "retrieve_payment_intent",
                &format!("payment_intents/{}", intent_id),
            )
            .await?;
        Ok(intent.into())
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, WebhookError> {
        let event = self
            .verifier
            .verify_and_parse(payload, signature)
            .map_err(|e| {
                tracing::warn!(error = %e, "Stripe webhook verification failed");
                e
            })?;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            livemode = event.livemode,
            "Webhook signature verified"
        );
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> StripePaymentAdapter {
        StripePaymentAdapter::new(StripeConfig::new("sk_test_key", "whsec_test_secret")).unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn config_new_sets_defaults() {
        let config = StripeConfig::new("api_key", "webhook_secret");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn config_with_base_url_trims_slash() {
        let config = StripeConfig::new("key", "secret").with_base_url("http://localhost:12111/");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    #[test]
    fn config_debug_hides_secrets() {
        let debug = format!("{:?}", StripeConfig::new("sk_test_abc", "whsec_xyz"));
        assert!(!debug.contains("sk_test_abc"));
        assert!(!debug.contains("whsec_xyz"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Form Encoding Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn customer_params_include_address_and_metadata() {
        let mut metadata = HashMap::new();
        metadata.insert("purpose".to_string(), "membership".to_string());
        let request = CreateCustomerRequest {
            email: "a@b.co".to_string(),
            name: Some("A B".to_string()),
            phone: None,
            address: Some(BillingAddress {
                line1: Some("1 Main St".to_string()),
                city: Some("Springfield".to_string()),
                ..Default::default()
            }),
            metadata,
            idempotency_key: Some("customer-1".to_string()),
        };

        let params = customer_params(&request);

        assert!(params.contains(&("email".to_string(), "a@b.co".to_string())));
        assert!(params.contains(&("address[line1]".to_string(), "1 Main St".to_string())));
        assert!(params.contains(&("metadata[purpose]".to_string(), "membership".to_string())));
        assert!(!params.iter().any(|(k, _)| k == "phone" || k == "address[line2]"));
        assert!(!params.iter().any(|(k, _)| k.contains("idempotency")));
    }

    #[test]
    fn intent_params_use_minor_units() {
        let request = CreatePaymentIntentRequest {
            customer_id: "cus_1".to_string(),
            amount_cents: 2500,
            currency: "USD".to_string(),
            description: None,
            metadata: HashMap::new(),
            idempotency_key: None,
        };

        let params = payment_intent_params(&request);

        assert!(params.contains(&("amount".to_string(), "2500".to_string())));
        assert!(params.contains(&("currency".to_string(), "usd".to_string())));
        assert!(params.contains(&("customer".to_string(), "cus_1".to_string())));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Guard Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn malformed_intent_id_is_rejected_locally() {
        let err = adapter()
            .retrieve_payment_intent("pi_1/../../customers")
            .await
            .unwrap_err();
        assert_eq!(err.code, PaymentErrorCode::InvalidRequest);
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected_locally() {
        let request = CreatePaymentIntentRequest {
            customer_id: "cus_1".to_string(),
            amount_cents: 0,
            currency: "usd".to_string(),
            description: None,
            metadata: HashMap::new(),
            idempotency_key: None,
        };
        let err = adapter().create_payment_intent(request).await.unwrap_err();
        assert_eq!(err.code, PaymentErrorCode::InvalidRequest);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Webhook Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn verify_webhook_accepts_signed_payload() {
        let payload = br#"{"id":"evt_1","type":"invoice.paid","created":1,"data":{"object":{}}}"#;
        let signer = StripeWebhookVerifier::new(SecretString::new("whsec_test_secret".to_string()));
        let header = signer.sign(chrono::Utc::now().timestamp(), payload).unwrap();

        let event = adapter().verify_webhook(payload, &header).await.unwrap();
        assert_eq!(event.id, "evt_1");
    }

    #[tokio::test]
    async fn verify_webhook_rejects_other_secret() {
        let payload = br#"{"id":"evt_1","type":"invoice.paid","created":1,"data":{"object":{}}}"#;
        let signer = StripeWebhookVerifier::new(SecretString::new("whsec_other".to_string()));
        let header = signer.sign(chrono::Utc::now().timestamp(), payload).unwrap();

        let err = adapter().verify_webhook(payload, &header).await.unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));
    }
}
