//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Store Ports
//!
//! - `MemberRepository` - Member records (insert-if-absent, versioned update)
//! - `RegistrationRepository` - Paid event registrations
//! - `WebhookEventRepository` - Stripe webhook idempotency tracking
//!
//! ## Collaborator Ports
//!
//! - `PaymentProvider` - Customers, payment intents, webhook verification
//! - `PasswordHasher` - Opaque password hashing
//! - `ConfirmationSender` - Fire-and-forget purchase confirmations

mod confirmation_sender;
mod member_repository;
mod password_hasher;
mod payment_provider;
mod registration_repository;
mod webhook_event_repository;

pub use confirmation_sender::{ConfirmationKind, ConfirmationSender, PurchaseConfirmation};
pub use member_repository::{InsertOutcome, MemberRepository};
pub use password_hasher::PasswordHasher;
pub use payment_provider::{
    CreateCustomerRequest, CreatePaymentIntentRequest, Customer, PaymentError, PaymentErrorCode,
    PaymentIntent, PaymentIntentStatus, PaymentProvider,
};
pub use registration_repository::RegistrationRepository;
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome,
};
