//! Application handlers.
//!
//! Command handlers that orchestrate domain operations.

pub mod membership;
