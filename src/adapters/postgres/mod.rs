//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresMemberRepository` - Members with JSONB profile and payment history
//! - `PostgresRegistrationRepository` - Paid event registrations
//! - `PostgresWebhookEventRepository` - Processed Stripe event ids
//! - `shared_pool` - Lazily connected process-wide pool

mod connection;
mod member_repository;
mod registration_repository;
mod webhook_event_repository;

pub use connection::shared_pool;
pub use member_repository::PostgresMemberRepository;
pub use registration_repository::PostgresRegistrationRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;
