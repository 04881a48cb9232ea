//! In-memory store adapters.
//!
//! Used by tests and by the `memory` storage backend for local development.
//! Each store honours the same atomicity contract as its Postgres
//! counterpart: insert-if-absent, versioned updates, insert-once event log.

mod member_repository;
mod registration_repository;
mod webhook_event_repository;

pub use member_repository::InMemoryMemberRepository;
pub use registration_repository::InMemoryRegistrationRepository;
pub use webhook_event_repository::InMemoryWebhookEventRepository;
