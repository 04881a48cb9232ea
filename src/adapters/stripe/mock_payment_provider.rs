//! Mock payment provider for testing.
//!
//! Provides a configurable implementation of `PaymentProvider` for unit and
//! integration tests. Supports:
//! - In-memory customers and payment intents
//! - Idempotency-key replay, like Stripe
//! - Queued error injection per method
//! - Call tracking
//! - Real webhook signing and verification with a test secret

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;

use crate::domain::membership::{StripeEvent, StripeWebhookVerifier, WebhookError};
use crate::ports::{
    CreateCustomerRequest, CreatePaymentIntentRequest, Customer, PaymentError, PaymentIntent,
    PaymentIntentStatus, PaymentProvider,
};

/// Webhook secret used when none is configured.
pub const MOCK_WEBHOOK_SECRET: &str = "whsec_mock_provider_secret";

/// Mock payment provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentProvider::new();
/// mock.fail_next("create_customer", PaymentError::network("reset"));
///
/// let intent = mock.create_payment_intent(request).await?;
/// mock.set_intent_status(&intent.id, PaymentIntentStatus::Succeeded);
/// ```
#[derive(Clone)]
pub struct MockPaymentProvider {
    inner: Arc<Mutex<MockState>>,
    verifier: StripeWebhookVerifier,
}

#[derive(Default)]
struct MockState {
    customers: HashMap<String, Customer>,
    intents: HashMap<String, PaymentIntent>,
    idempotent_customers: HashMap<String, String>,
    idempotent_intents: HashMap<String, String>,
    method_errors: HashMap<String, VecDeque<PaymentError>>,
    call_log: Vec<MethodCall>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::with_webhook_secret(MOCK_WEBHOOK_SECRET)
    }

    pub fn with_webhook_secret(secret: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState::default())),
            verifier: StripeWebhookVerifier::new(SecretString::new(secret.to_string())),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Queue an error for the next call to `method`.
    ///
    /// Queued errors are consumed in order, one per call.
    pub fn fail_next(&self, method: &str, error: PaymentError) {
        self.inner
            .lock()
            .unwrap()
            .method_errors
            .entry(method.to_string())
            .or_default()
            .push_back(error);
    }

    /// Store an intent as if the provider had created it.
    pub fn insert_intent(&self, intent: PaymentIntent) {
        self.inner
            .lock()
            .unwrap()
            .intents
            .insert(intent.id.clone(), intent);
    }

    /// Simulate client-side confirmation (or failure) of an intent.
    pub fn set_intent_status(&self, intent_id: &str, status: PaymentIntentStatus) {
        if let Some(intent) = self.inner.lock().unwrap().intents.get_mut(intent_id) {
            intent.status = status;
        }
    }

    pub fn intent(&self, intent_id: &str) -> Option<PaymentIntent> {
        self.inner.lock().unwrap().intents.get(intent_id).cloned()
    }

    /// Builds a valid `Stripe-Signature` header for `payload` signed now.
    pub fn sign_webhook(&self, payload: &[u8]) -> String {
        self.verifier
            .sign(chrono::Utc::now().timestamp(), payload)
            .unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.inner.lock().unwrap().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn customer_count(&self) -> usize {
        self.inner.lock().unwrap().customers.len()
    }

    fn record_call(state: &mut MockState, method: &str, args: Vec<String>) {
        state.call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn take_error(state: &mut MockState, method: &str) -> Option<PaymentError> {
        state
            .method_errors
            .get_mut(method)
            .and_then(|queue| queue.pop_front())
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let mut state = self.inner.lock().unwrap();
        Self::record_call(
            &mut state,
            "create_customer",
            vec![request.email.clone(), request.name.clone().unwrap_or_default()],
        );

        if let Some(err) = Self::take_error(&mut state, "create_customer") {
            return Err(err);
        }

        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = state.idempotent_customers.get(key) {
                if let Some(customer) = state.customers.get(existing) {
                    return Ok(customer.clone());
                }
            }
        }

        let customer = Customer {
            id: format!("cus_mock_{}", state.next_id()),
            email: Some(request.email),
            name: request.name,
        };
        if let Some(key) = request.idempotency_key {
            state.idempotent_customers.insert(key, customer.id.clone());
        }
        state.customers.insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut state = self.inner.lock().unwrap();
        Self::record_call(
            &mut state,
            "create_payment_intent",
            vec![request.customer_id.clone(), request.amount_cents.to_string()],
        );

        if let Some(err) = Self::take_error(&mut state, "create_payment_intent") {
            return Err(err);
        }

        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = state.idempotent_intents.get(key) {
                if let Some(intent) = state.intents.get(existing) {
                    return Ok(intent.clone());
                }
            }
        }

        let id = format!("pi_mock_{}", state.next_id());
        let intent = PaymentIntent {
            client_secret: Some(format!("{}_secret_mock", id)),
            id,
            amount_cents: request.amount_cents,
            currency: request.currency,
            customer_id: Some(request.customer_id),
            status: PaymentIntentStatus::RequiresPaymentMethod,
            metadata: request.metadata,
        };
        if let Some(key) = request.idempotency_key {
            state.idempotent_intents.insert(key, intent.id.clone());
        }
        state.intents.insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut state = self.inner.lock().unwrap();
        Self::record_call(&mut state, "retrieve_payment_intent", vec![intent_id.to_string()]);

        if let Some(err) = Self::take_error(&mut state, "retrieve_payment_intent") {
            return Err(err);
        }

        state
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found("payment_intent"))
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, WebhookError> {
        {
            let mut state = self.inner.lock().unwrap();
            Self::record_call(&mut state, "verify_webhook", vec![signature.to_string()]);
        }
        self.verifier.verify_and_parse(payload, signature)
    }
}
