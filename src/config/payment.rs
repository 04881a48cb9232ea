//! Payment configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::adapters::stripe::StripeConfig;
use crate::domain::membership::ProviderPriceIds;

use super::error::ValidationError;

/// Which payment provider implementation to run against
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentBackend {
    #[default]
    Stripe,
    /// In-process fake for local development
    Mock,
}

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    #[serde(default)]
    pub backend: PaymentBackend,

    /// Stripe API key
    #[serde(default = "empty_secret")]
    pub stripe_api_key: SecretString,

    /// Stripe webhook signing secret
    #[serde(default = "empty_secret")]
    pub stripe_webhook_secret: SecretString,

    /// Stripe API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Stripe price IDs per membership role
    pub price_id_full: Option<String>,
    pub price_id_affiliate: Option<String>,
    pub price_id_studentbt: Option<String>,

    /// Timeout for each Stripe API call in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Ignore webhook events not sent in live mode
    #[serde(default)]
    pub require_livemode: bool,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_live_")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Price ids for the pricing resolver, falling back to the built-in ids
    pub fn price_ids(&self) -> ProviderPriceIds {
        let defaults = ProviderPriceIds::default();
        ProviderPriceIds {
            full: self.price_id_full.clone().unwrap_or(defaults.full),
            affiliate: self.price_id_affiliate.clone().unwrap_or(defaults.affiliate),
            studentbt: self.price_id_studentbt.clone().unwrap_or(defaults.studentbt),
        }
    }

    /// Builds the Stripe adapter configuration
    pub fn stripe_config(&self) -> StripeConfig {
        StripeConfig::from_secrets(
            self.stripe_api_key.clone(),
            self.stripe_webhook_secret.clone(),
        )
        .with_base_url(&self.api_base_url)
        .with_timeout(self.request_timeout())
    }

    /// Validate payment configuration
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if self.backend == PaymentBackend::Mock {
            if production {
                return Err(ValidationError::MockProviderInProduction);
            }
            return Ok(());
        }

        let api_key = self.stripe_api_key.expose_secret();
        let webhook_secret = self.stripe_webhook_secret.expose_secret();
        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }

        // Verify key prefixes for safety
        if !api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if production && !self.api_base_url.starts_with("https://") {
            return Err(ValidationError::StripeBaseUrlMustBeHttps);
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            backend: PaymentBackend::default(),
            stripe_api_key: empty_secret(),
            stripe_webhook_secret: empty_secret(),
            api_base_url: default_api_base_url(),
            price_id_full: None,
            price_id_affiliate: None,
            price_id_studentbt: None,
            request_timeout_secs: default_request_timeout(),
            require_livemode: false,
        }
    }
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_request_timeout() -> u64 {
    10
}
