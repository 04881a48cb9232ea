//! Application layer - Commands and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;
mod keyed_locks;

pub use handlers::membership::{
    BeginPurchaseCommand, BeginPurchaseHandler, BeginPurchaseResult, FinalizeOutcome,
    FinalizePurchaseCommand, FinalizePurchaseHandler, FinalizePurchaseResult,
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
    PurchaseProfile,
};
pub use keyed_locks::{KeyGuard, KeyedLocks};
