//! Member Portal - Membership purchases and Stripe payment reconciliation
//!
//! Members pay for a role-priced annual membership through a Stripe payment
//! intent. The server verifies every charge with Stripe before writing, and
//! reconciles asynchronous provider events delivered by signed webhooks.

pub mod adapters;
pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod ports;
