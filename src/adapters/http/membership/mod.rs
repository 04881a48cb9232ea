//! HTTP adapter for membership endpoints.
//!
//! Exposes the purchase flow and provider webhooks via REST API:
//! - `POST /api/membership/purchase` - Start a purchase
//! - `POST /api/membership/finalize` - Finalize a purchase after payment
//! - `POST /api/webhooks/stripe` - Handle Stripe webhooks

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{health, MembershipAppState};
pub use routes::membership_router;
