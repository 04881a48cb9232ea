//! Membership domain module.
//!
//! Member records, pricing, payment history and the Stripe event types the
//! reconciler consumes.
//!
//! # Module Structure
//!
//! - `member` - Member aggregate
//! - `pricing` - Pure price/duration/expiry lookups per role
//! - `payment_record` - Append-only payment audit entries
//! - `purchase` - Metadata tagging provider intents
//! - `webhook_verifier` - Stripe signature verification

mod email;
mod errors;
mod member;
mod payment_record;
mod pricing;
mod purchase;
mod role;
mod status;
pub mod stripe_event;
mod webhook_errors;
mod webhook_verifier;

pub use email::Email;
pub use errors::MembershipError;
pub use member::{BillingAddress, Member, MemberProfile, NewMember, PasswordHash};
pub use payment_record::{PaymentRecord, PaymentRecordStatus, PaymentReference};
pub use pricing::{
    format_cents, MembershipPrice, PricingResolver, ProviderPriceIds, MEMBERSHIP_CURRENCY,
};
pub use purchase::{PurchaseMetadata, PurchasePurpose};
pub use role::MemberRole;
pub use status::{MembershipStatus, SubscriptionStatus};
pub use stripe_event::{
    InvoiceObject, PaymentIntentObject, StripeEvent, StripeEventType, SubscriptionObject,
};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{SignatureHeader, StripeWebhookVerifier};
