//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `membership` - Members, pricing, payment history, Stripe events
//! - `registration` - Paid event registrations reconciled from webhooks

pub mod foundation;
pub mod membership;
pub mod registration;
