//! Renewal write shared by finalize and the webhook reconciler.
//!
//! Both entry points can see the same successful intent. Whichever gets the
//! member's lock first applies it; the other finds the completed record and
//! stops without writing.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::membership::{
    Email, Member, MemberRole, MembershipError, PaymentRecord, PaymentReference, PricingResolver,
};
use crate::ports::{ConfirmationKind, ConfirmationSender, MemberRepository, PurchaseConfirmation};

/// Attempts at a read-verify-write before giving up on a contended member.
pub(crate) const MAX_WRITE_ATTEMPTS: usize = 3;

/// A provider-confirmed successful charge.
#[derive(Debug, Clone)]
pub(crate) struct VerifiedPayment {
    pub payment_intent_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub customer_id: Option<String>,
}

impl VerifiedPayment {
    pub fn reference(&self) -> PaymentReference {
        PaymentReference::payment_intent(&self.payment_intent_id)
    }

    pub fn completed_record(&self) -> PaymentRecord {
        PaymentRecord::completed(self.reference(), self.amount_cents, &self.currency)
    }
}

#[derive(Debug)]
pub(crate) enum RenewalOutcome {
    Applied(Member),
    AlreadyApplied(Member),
}

/// Checks that a charge pays for `role` at its current price.
pub(crate) fn ensure_amount_matches(
    pricing: &PricingResolver,
    role: MemberRole,
    payment: &VerifiedPayment,
) -> Result<(), MembershipError> {
    let price = pricing.price_for(role);
    if payment.amount_cents != price.amount_cents
        || !payment.currency.eq_ignore_ascii_case(&price.currency)
    {
        return Err(MembershipError::payment_mismatch(format!(
            "charged {} {}, {} membership costs {} {}",
            payment.amount_cents,
            payment.currency,
            role,
            price.amount_cents,
            price.currency
        )));
    }
    Ok(())
}

/// Applies `payment` as a renewal of the member registered under `email`.
///
/// The caller must hold the member's lock. The role is `requested_role` if
/// given, otherwise the member's current role. Expiry is reset to a full
/// term from now.
pub(crate) async fn apply_renewal(
    members: &dyn MemberRepository,
    pricing: &PricingResolver,
    email: &Email,
    requested_role: Option<MemberRole>,
    payment: &VerifiedPayment,
) -> Result<RenewalOutcome, MembershipError> {
    let reference = payment.reference();

    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let mut member = members
            .find_by_email(email)
            .await?
            .ok_or_else(|| MembershipError::member_not_found(email.as_str()))?;

        if member.has_completed_payment(&reference) {
            tracing::debug!(
                member_id = %member.id,
                payment_intent_id = %payment.payment_intent_id,
                "Renewal already applied"
            );
            return Ok(RenewalOutcome::AlreadyApplied(member));
        }

        let role = requested_role.unwrap_or(member.role);
        ensure_amount_matches(pricing, role, payment)?;

        let expiry = pricing.compute_expiry(role, Timestamp::now());
        member.renew(
            role,
            expiry,
            payment.customer_id.clone(),
            payment.completed_record(),
        );

        match members.update(&member).await {
            Ok(()) => {
                member.version += 1;
                return Ok(RenewalOutcome::Applied(member));
            }
            Err(err) if err.is_concurrent_modification() => {
                tracing::debug!(
                    attempt,
                    member_id = %member.id,
                    "Member changed during renewal, re-reading"
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(MembershipError::infrastructure(
        "member record kept changing during renewal",
    ))
}

/// Sends a purchase confirmation on a background task.
///
/// Failures are logged and never reach the caller.
pub(crate) fn spawn_confirmation(
    sender: Arc<dyn ConfirmationSender>,
    member: &Member,
    kind: ConfirmationKind,
    payment: &VerifiedPayment,
) {
    let Some(expiry) = member.membership_expiry else {
        return;
    };
    let confirmation = PurchaseConfirmation {
        member_id: member.id,
        email: member.email.clone(),
        name: member.name.clone(),
        role: member.role,
        kind,
        amount_cents: payment.amount_cents,
        currency: payment.currency.clone(),
        membership_expiry: expiry,
    };

    tokio::spawn(async move {
        let member_id = confirmation.member_id;
        if let Err(err) = sender.send(confirmation).await {
            tracing::warn!(%member_id, error = %err, "Failed to send purchase confirmation");
        }
    });
}
