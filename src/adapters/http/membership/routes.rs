//! Axum router configuration for membership endpoints.
//!
//! This module defines the route structure for membership-related API endpoints
//! and wires them to their corresponding handlers.

use axum::{routing::post, Router};

use super::handlers::{
    begin_purchase, finalize_purchase, handle_stripe_webhook, MembershipAppState,
};

/// Create the membership purchase router.
///
/// # Routes
/// - `POST /purchase` - Start a purchase (customer + payment intent)
/// - `POST /finalize` - Verify the payment and create or renew the member
pub fn membership_routes() -> Router<MembershipAppState> {
    Router::new()
        .route("/purchase", post(begin_purchase))
        .route("/finalize", post(finalize_purchase))
}

/// Create the Stripe webhook router.
///
/// Separate from the purchase routes because webhooks are authenticated by
/// signature rather than by the browser session.
///
/// # Routes
/// - `POST /stripe` - Handle Stripe webhooks
pub fn webhook_routes() -> Router<MembershipAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Create the complete membership module router.
///
/// Suitable for mounting at `/api`:
///
/// ```ignore
/// let app = Router::new()
///     .nest("/api", membership_router())
///     .with_state(app_state);
/// ```
pub fn membership_router() -> Router<MembershipAppState> {
    Router::new()
        .nest("/membership", membership_routes())
        .nest("/webhooks", webhook_routes())
}
