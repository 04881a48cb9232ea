//! Wires configured adapters into the HTTP application state.

use std::sync::Arc;

use secrecy::ExposeSecret;
use thiserror::Error;

use crate::adapters::auth::Argon2PasswordHasher;
use crate::adapters::email::LoggingConfirmationSender;
use crate::adapters::http::MembershipAppState;
use crate::adapters::memory::{
    InMemoryMemberRepository, InMemoryRegistrationRepository, InMemoryWebhookEventRepository,
};
use crate::adapters::postgres::{
    shared_pool, PostgresMemberRepository, PostgresRegistrationRepository,
    PostgresWebhookEventRepository,
};
use crate::adapters::stripe::{MockPaymentProvider, StripePaymentAdapter, MOCK_WEBHOOK_SECRET};
use crate::application::KeyedLocks;
use crate::config::{AppConfig, PaymentBackend, StorageBackend};
use crate::domain::foundation::DomainError;
use crate::domain::membership::PricingResolver;
use crate::ports::{
    MemberRepository, PaymentError, PaymentProvider, RegistrationRepository,
    WebhookEventRepository,
};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Storage initialization failed: {0}")]
    Storage(#[from] DomainError),

    #[error("Payment provider initialization failed: {0}")]
    Payment(#[from] PaymentError),
}

struct Stores {
    members: Arc<dyn MemberRepository>,
    registrations: Arc<dyn RegistrationRepository>,
    processed_events: Arc<dyn WebhookEventRepository>,
}

/// Builds the application state described by `config`.
pub async fn build_state(config: &AppConfig) -> Result<MembershipAppState, BootstrapError> {
    let stores = build_stores(config).await?;
    let payment_provider = build_payment_provider(config)?;

    Ok(MembershipAppState {
        members: stores.members,
        registrations: stores.registrations,
        processed_events: stores.processed_events,
        payment_provider,
        password_hasher: Arc::new(Argon2PasswordHasher::new()),
        confirmations: Arc::new(LoggingConfirmationSender::new(&config.email)),
        pricing: Arc::new(PricingResolver::new(config.payment.price_ids())),
        locks: KeyedLocks::new(),
        require_livemode: config.payment.require_livemode,
    })
}

async fn build_stores(config: &AppConfig) -> Result<Stores, BootstrapError> {
    match config.database.backend {
        StorageBackend::Postgres => {
            let pool = shared_pool(&config.database).await?;
            Ok(Stores {
                members: Arc::new(PostgresMemberRepository::new(pool.clone())),
                registrations: Arc::new(PostgresRegistrationRepository::new(pool.clone())),
                processed_events: Arc::new(PostgresWebhookEventRepository::new(pool)),
            })
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Stores {
                members: Arc::new(InMemoryMemberRepository::new()),
                registrations: Arc::new(InMemoryRegistrationRepository::new()),
                processed_events: Arc::new(InMemoryWebhookEventRepository::new()),
            })
        }
    }
}

fn build_payment_provider(config: &AppConfig) -> Result<Arc<dyn PaymentProvider>, BootstrapError> {
    match config.payment.backend {
        PaymentBackend::Stripe => {
            tracing::info!(
                live_mode = config.payment.is_live_mode(),
                base_url = %config.payment.api_base_url,
                "Using Stripe payment provider"
            );
            Ok(Arc::new(StripePaymentAdapter::new(
                config.payment.stripe_config(),
            )?))
        }
        PaymentBackend::Mock => {
            let secret = config.payment.stripe_webhook_secret.expose_secret();
            let secret = if secret.is_empty() {
                MOCK_WEBHOOK_SECRET
            } else {
                secret.as_str()
            };
            tracing::warn!("Using mock payment provider; no real charges are made");
            Ok(Arc::new(MockPaymentProvider::with_webhook_secret(secret)))
        }
    }
}
