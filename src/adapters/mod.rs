//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `stripe` - Payment provider (Stripe REST API, plus an in-process mock)
//! - `postgres` - Member, registration and webhook event stores
//! - `memory` - In-process stores for tests and local development
//! - `auth` - Argon2 password hashing
//! - `email` - Purchase confirmation delivery
//! - `http` - Axum REST API

pub mod auth;
pub mod email;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
