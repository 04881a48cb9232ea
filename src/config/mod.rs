//! Portal configuration.
//!
//! Everything is read from `MEMBER_PORTAL__*` environment variables, with a
//! `.env` file honoured in development. Nesting follows the struct layout:
//! `MEMBER_PORTAL__PAYMENT__STRIPE_API_KEY` sets `payment.stripe_api_key`.
//!
//! ```no_run
//! use member_portal::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! config.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod database;
mod email;
mod error;
mod payment;
mod server;

pub use database::{DatabaseConfig, StorageBackend};
pub use email::EmailConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::{PaymentBackend, PaymentConfig};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub payment: PaymentConfig,

    /// Sender identity on purchase confirmations
    #[serde(default)]
    pub email: EmailConfig,
}

impl AppConfig {
    /// Reads the process environment.
    ///
    /// Only type errors fail here; call [`AppConfig::validate`] before use.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MEMBER_PORTAL")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Checks every section, then the cross-section production rules.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        if self.is_production() && self.database.is_memory() {
            return Err(ValidationError::MemoryStorageInProduction);
        }
        self.payment.validate(self.is_production())?;
        self.email.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
