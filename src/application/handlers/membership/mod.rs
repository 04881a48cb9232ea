//! Membership purchase handlers.
//!
//! - `BeginPurchaseHandler` creates the provider customer and intent
//! - `FinalizePurchaseHandler` writes the member after server-side verification
//! - `HandlePaymentWebhookHandler` reconciles provider events

mod begin_purchase;
mod finalize_purchase;
mod handle_payment_webhook;
mod provider_call;
mod renewal;

#[cfg(test)]
pub(crate) mod test_support;

pub use begin_purchase::{
    BeginPurchaseCommand, BeginPurchaseHandler, BeginPurchaseResult, PurchaseProfile,
};
pub use finalize_purchase::{
    FinalizeOutcome, FinalizePurchaseCommand, FinalizePurchaseHandler, FinalizePurchaseResult,
};
pub use handle_payment_webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
};
