//! HandlePaymentWebhookHandler - Command handler for processing payment provider webhooks.
//!
//! Every mutation here is a conditional set or an append-if-absent, so a
//! redelivered event converges on the same state. Event ids are recorded
//! only after the event was applied or deliberately ignored.

use std::sync::Arc;

use crate::application::KeyedLocks;
use crate::domain::foundation::{RegistrationId, Timestamp};
use crate::domain::membership::{
    Email, InvoiceObject, Member, MembershipError, PaymentIntentObject, PaymentRecord,
    PaymentRecordStatus, PaymentReference, PricingResolver, PurchaseMetadata, PurchasePurpose,
    StripeEvent, StripeEventType, SubscriptionObject, SubscriptionStatus, WebhookError,
};
use crate::domain::registration::RegistrationStatus;
use crate::ports::{
    ConfirmationKind, ConfirmationSender, MemberRepository, PaymentProvider,
    RegistrationRepository, WebhookEventRecord, WebhookEventRepository,
};

use super::renewal::{
    apply_renewal, spawn_confirmation, RenewalOutcome, VerifiedPayment, MAX_WRITE_ATTEMPTS,
};

/// Command to handle a payment webhook.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw webhook payload, exactly as received.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header.
    pub signature: String,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlePaymentWebhookResult {
    /// The event changed (or confirmed) local state.
    Processed { event_id: String },
    /// The event needs no action.
    Ignored { event_id: String, reason: String },
    /// The event id was already handled.
    Duplicate { event_id: String },
}

pub struct HandlePaymentWebhookHandler {
    payment_provider: Arc<dyn PaymentProvider>,
    members: Arc<dyn MemberRepository>,
    registrations: Arc<dyn RegistrationRepository>,
    processed_events: Arc<dyn WebhookEventRepository>,
    confirmations: Arc<dyn ConfirmationSender>,
    pricing: Arc<PricingResolver>,
    locks: KeyedLocks,
    require_livemode: bool,
}

impl HandlePaymentWebhookHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        payment_provider: Arc<dyn PaymentProvider>,
        members: Arc<dyn MemberRepository>,
        registrations: Arc<dyn RegistrationRepository>,
        processed_events: Arc<dyn WebhookEventRepository>,
        confirmations: Arc<dyn ConfirmationSender>,
        pricing: Arc<PricingResolver>,
        locks: KeyedLocks,
    ) -> Self {
        Self {
            payment_provider,
            members,
            registrations,
            processed_events,
            confirmations,
            pricing,
            locks,
            require_livemode: false,
        }
    }

    /// Ignore events from Stripe test mode.
    pub fn with_livemode_required(mut self, required: bool) -> Self {
        self.require_livemode = required;
        self
    }

    #[tracing::instrument(skip_all, fields(payload_bytes = cmd.payload.len()))]
    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        // 1. Authenticate
        let event = self
            .payment_provider
            .verify_webhook(&cmd.payload, &cmd.signature)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "Rejected webhook delivery");
                err
            })?;

        // 2. Skip redeliveries
        if self.processed_events.contains(&event.id).await? {
            tracing::debug!(event_id = %event.id, "Webhook event already handled");
            return Ok(HandlePaymentWebhookResult::Duplicate { event_id: event.id });
        }

        // 3. Apply
        let outcome = if self.require_livemode && !event.livemode {
            Err(WebhookError::Ignored("test mode event".to_string()))
        } else {
            self.dispatch(&event).await
        };

        // 4. Record what was handled; leave failures for redelivery
        match outcome {
            Ok(()) => {
                self.processed_events
                    .save(WebhookEventRecord::processed(&event.id, &event.event_type))
                    .await?;
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "Webhook processed"
                );
                Ok(HandlePaymentWebhookResult::Processed { event_id: event.id })
            }
            Err(err @ (WebhookError::Ignored(_) | WebhookError::MemberNotFound(_))) => {
                let reason = match err {
                    WebhookError::Ignored(reason) => reason,
                    other => other.to_string(),
                };
                self.processed_events
                    .save(WebhookEventRecord::ignored(&event.id, &event.event_type, &reason))
                    .await?;
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    %reason,
                    "Webhook ignored"
                );
                Ok(HandlePaymentWebhookResult::Ignored {
                    event_id: event.id,
                    reason,
                })
            }
            Err(err) => {
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %err,
                    retryable = err.is_retryable(),
                    "Webhook processing failed"
                );
                Err(err)
            }
        }
    }

    async fn dispatch(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        match event.parsed_type() {
            StripeEventType::CustomerSubscriptionCreated
            | StripeEventType::CustomerSubscriptionUpdated => {
                self.handle_subscription_changed(event).await
            }
            StripeEventType::CustomerSubscriptionDeleted => {
                self.handle_subscription_deleted(event).await
            }
            StripeEventType::InvoicePaymentSucceeded => {
                self.handle_invoice(event, PaymentRecordStatus::Completed).await
            }
            StripeEventType::InvoicePaymentFailed => {
                self.handle_invoice(event, PaymentRecordStatus::Failed).await
            }
            StripeEventType::PaymentIntentSucceeded => self.handle_intent_succeeded(event).await,
            StripeEventType::PaymentIntentPaymentFailed => {
                self.handle_intent_closed(event, RegistrationStatus::Failed).await
            }
            StripeEventType::PaymentIntentCanceled => {
                self.handle_intent_closed(event, RegistrationStatus::Canceled).await
            }
            StripeEventType::PaymentIntentCreated => Err(WebhookError::Ignored(
                "intent creation needs no action".to_string(),
            )),
            StripeEventType::Unknown => Err(WebhookError::Ignored(format!(
                "unhandled event type {}",
                event.event_type
            ))),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Subscriptions
    // ════════════════════════════════════════════════════════════════════════════

    async fn handle_subscription_changed(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let subscription: SubscriptionObject = parse_object(event)?;
        let status = SubscriptionStatus::from_provider(&subscription.status).ok_or_else(|| {
            WebhookError::Ignored(format!(
                "subscription status {} needs no action",
                subscription.status
            ))
        })?;

        let member = self.member_by_customer(&subscription.customer).await?;
        self.update_member(member, |member| {
            let expiry = self.pricing.compute_expiry(member.role, Timestamp::now());
            member.apply_subscription(
                &subscription.id,
                status,
                subscription.cancel_at_period_end,
                expiry,
            );
            true
        })
        .await
    }

    async fn handle_subscription_deleted(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let subscription: SubscriptionObject = parse_object(event)?;
        let member = self.member_by_customer(&subscription.customer).await?;

        self.update_member(member, |member| {
            // A replaced subscription must not end the current one.
            if member
                .stripe_subscription_id
                .as_deref()
                .is_some_and(|current| current != subscription.id)
            {
                return false;
            }
            member.end_subscription();
            true
        })
        .await
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Invoices
    // ════════════════════════════════════════════════════════════════════════════

    async fn handle_invoice(
        &self,
        event: &StripeEvent,
        status: PaymentRecordStatus,
    ) -> Result<(), WebhookError> {
        let invoice: InvoiceObject = parse_object(event)?;
        let customer = invoice
            .customer
            .as_deref()
            .ok_or(WebhookError::MissingField("customer"))?;
        let member = self.member_by_customer(customer).await?;

        let reference = PaymentReference::invoice(&invoice.id);
        let record = match status {
            PaymentRecordStatus::Completed => {
                PaymentRecord::completed(reference, invoice.amount_paid, &invoice.currency)
            }
            _ => PaymentRecord::failed(reference, invoice.amount_due, &invoice.currency),
        };

        self.update_member(member, |member| {
            let appended = member.record_payment(record.clone());
            let newly_past_due = status == PaymentRecordStatus::Failed
                && member.subscription_status != Some(SubscriptionStatus::PastDue);
            if newly_past_due {
                member.mark_past_due();
            }
            appended || newly_past_due
        })
        .await
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Payment Intents
    // ════════════════════════════════════════════════════════════════════════════

    async fn handle_intent_succeeded(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let intent: PaymentIntentObject = parse_object(event)?;
        let metadata = tagged_metadata(&intent)?;

        match metadata.purpose {
            PurchasePurpose::EventRegistration => {
                self.settle_registration(
                    &intent.id,
                    metadata.registration_id.as_deref(),
                    RegistrationStatus::Completed,
                )
                .await
            }
            PurchasePurpose::Membership if metadata.is_renewal => {
                self.reconcile_renewal(&intent, &metadata).await
            }
            PurchasePurpose::Membership => Err(WebhookError::Ignored(
                "new memberships are created at finalize".to_string(),
            )),
        }
    }

    async fn handle_intent_closed(
        &self,
        event: &StripeEvent,
        registration_status: RegistrationStatus,
    ) -> Result<(), WebhookError> {
        let intent: PaymentIntentObject = parse_object(event)?;
        let metadata = tagged_metadata(&intent)?;

        match metadata.purpose {
            PurchasePurpose::EventRegistration => {
                self.settle_registration(
                    &intent.id,
                    metadata.registration_id.as_deref(),
                    registration_status,
                )
                .await
            }
            PurchasePurpose::Membership => {
                let Some(member) = self
                    .member_for_intent(metadata.email.as_ref(), intent.customer.as_deref())
                    .await?
                else {
                    return Err(WebhookError::Ignored(
                        "no member for failed intent".to_string(),
                    ));
                };
                let record = PaymentRecord::failed(
                    PaymentReference::payment_intent(&intent.id),
                    intent.amount,
                    &intent.currency,
                );
                self.update_member(member, |member| member.record_payment(record.clone()))
                    .await
            }
        }
    }

    async fn reconcile_renewal(
        &self,
        intent: &PaymentIntentObject,
        metadata: &PurchaseMetadata,
    ) -> Result<(), WebhookError> {
        let email = match &metadata.email {
            Some(email) => email.clone(),
            None => {
                let customer = intent
                    .customer
                    .as_deref()
                    .ok_or(WebhookError::MissingField("customer"))?;
                self.member_by_customer(customer).await?.email
            }
        };
        let payment = VerifiedPayment {
            payment_intent_id: intent.id.clone(),
            amount_cents: intent.amount,
            currency: intent.currency.clone(),
            customer_id: intent.customer.clone(),
        };

        let _guard = self.locks.acquire(email.as_str()).await;
        let outcome = apply_renewal(
            self.members.as_ref(),
            &self.pricing,
            &email,
            metadata.role,
            &payment,
        )
        .await
        .map_err(renewal_error)?;

        if let RenewalOutcome::Applied(member) = outcome {
            tracing::info!(
                member_id = %member.id,
                payment_intent_id = %payment.payment_intent_id,
                "Membership renewed from webhook"
            );
            spawn_confirmation(
                Arc::clone(&self.confirmations),
                &member,
                ConfirmationKind::Renewal,
                &payment,
            );
        }
        Ok(())
    }

    /// Moves an event registration to `target`.
    ///
    /// Looks up by intent id, then by the id stored in metadata. The second
    /// lookup covers a webhook that outruns the registration's intent link;
    /// it is best effort, and an unmatched intent is acknowledged.
    async fn settle_registration(
        &self,
        payment_intent_id: &str,
        registration_id: Option<&str>,
        target: RegistrationStatus,
    ) -> Result<(), WebhookError> {
        let mut found = self
            .registrations
            .find_by_payment_intent_id(payment_intent_id)
            .await?;
        if found.is_none() {
            if let Some(id) = registration_id.and_then(|id| id.parse::<RegistrationId>().ok()) {
                tracing::debug!(
                    %payment_intent_id,
                    registration_id = %id,
                    "Falling back to metadata registration id"
                );
                found = self.registrations.find_by_id(&id).await?;
            }
        }
        let Some(found) = found else {
            tracing::warn!(%payment_intent_id, "No event registration for intent");
            return Err(WebhookError::Ignored(format!(
                "no event registration for intent {}",
                payment_intent_id
            )));
        };

        let _guard = self.locks.acquire(&format!("registration:{}", found.id)).await;
        let mut registration = self
            .registrations
            .find_by_id(&found.id)
            .await?
            .ok_or_else(|| WebhookError::Ignored(format!("registration {} vanished", found.id)))?;

        let linked = registration.payment_intent_id.as_deref() != Some(payment_intent_id);
        registration.link_payment_intent(payment_intent_id);
        let settled = registration.settle(target);
        if linked || settled {
            self.registrations.update(&registration).await?;
            tracing::info!(
                registration_id = %registration.id,
                status = registration.status.as_str(),
                "Event registration updated"
            );
        }
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Member Writes
    // ════════════════════════════════════════════════════════════════════════════

    async fn member_by_customer(&self, customer_id: &str) -> Result<Member, WebhookError> {
        self.members
            .find_by_stripe_customer_id(customer_id)
            .await?
            .ok_or_else(|| WebhookError::MemberNotFound(customer_id.to_string()))
    }

    async fn member_for_intent(
        &self,
        email: Option<&Email>,
        customer_id: Option<&str>,
    ) -> Result<Option<Member>, WebhookError> {
        if let Some(email) = email {
            if let Some(member) = self.members.find_by_email(email).await? {
                return Ok(Some(member));
            }
        }
        match customer_id {
            Some(customer_id) => Ok(self.members.find_by_stripe_customer_id(customer_id).await?),
            None => Ok(None),
        }
    }

    /// Re-reads `member` under its lock and applies `mutate`.
    ///
    /// `mutate` returns whether anything changed; unchanged members are not
    /// written.
    async fn update_member<F>(&self, member: Member, mut mutate: F) -> Result<(), WebhookError>
    where
        F: FnMut(&mut Member) -> bool,
    {
        let _guard = self.locks.acquire(member.email.as_str()).await;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut current = self
                .members
                .find_by_id(&member.id)
                .await?
                .ok_or_else(|| WebhookError::MemberNotFound(member.id.to_string()))?;

            if !mutate(&mut current) {
                return Ok(());
            }
            match self.members.update(&current).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_concurrent_modification() => {
                    tracing::debug!(
                        attempt,
                        member_id = %member.id,
                        "Member changed during webhook, re-reading"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(WebhookError::Database(format!(
            "member {} kept changing",
            member.id
        )))
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(event: &StripeEvent) -> Result<T, WebhookError> {
    event
        .deserialize_object()
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))
}

fn tagged_metadata(intent: &PaymentIntentObject) -> Result<PurchaseMetadata, WebhookError> {
    PurchaseMetadata::from_map(&intent.metadata)
        .ok_or_else(|| WebhookError::Ignored("intent was not created by the portal".to_string()))
}

fn renewal_error(err: MembershipError) -> WebhookError {
    match err {
        MembershipError::MemberNotFound(email) => WebhookError::MemberNotFound(email),
        MembershipError::PaymentMismatch { reason } => WebhookError::Ignored(reason),
        other => WebhookError::Database(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryMemberRepository, InMemoryRegistrationRepository, InMemoryWebhookEventRepository,
    };
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::application::handlers::membership::test_support::RecordingSender;
    use crate::domain::foundation::{DomainError, ErrorCode};
    use crate::domain::membership::{
        MemberProfile, MemberRole, MembershipStatus, NewMember, PasswordHash,
    };
    use crate::domain::registration::EventRegistration;
    use crate::ports::WebhookOutcome;
    use serde_json::{json, Value};

    // ════════════════════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        provider: MockPaymentProvider,
        members: InMemoryMemberRepository,
        registrations: InMemoryRegistrationRepository,
        events: InMemoryWebhookEventRepository,
        sender: RecordingSender,
        handler: HandlePaymentWebhookHandler,
    }

    fn fixture() -> Fixture {
        let provider = MockPaymentProvider::new();
        let members = InMemoryMemberRepository::new();
        let registrations = InMemoryRegistrationRepository::new();
        let events = InMemoryWebhookEventRepository::new();
        let sender = RecordingSender::default();
        let handler = HandlePaymentWebhookHandler::new(
            Arc::new(provider.clone()),
            Arc::new(members.clone()),
            Arc::new(registrations.clone()),
            Arc::new(events.clone()),
            Arc::new(sender.clone()),
            Arc::new(PricingResolver::default()),
            KeyedLocks::new(),
        );
        Fixture {
            provider,
            members,
            registrations,
            events,
            sender,
            handler,
        }
    }

    impl Fixture {
        fn command(
            &self,
            event_id: &str,
            event_type: &str,
            object: Value,
        ) -> HandlePaymentWebhookCommand {
            let payload = json!({
                "id": event_id,
                "type": event_type,
                "created": Timestamp::now().as_unix_secs(),
                "livemode": false,
                "data": { "object": object }
            })
            .to_string()
            .into_bytes();
            let signature = self.provider.sign_webhook(&payload);
            HandlePaymentWebhookCommand { payload, signature }
        }

        async fn deliver(
            &self,
            event_id: &str,
            event_type: &str,
            object: Value,
        ) -> Result<HandlePaymentWebhookResult, WebhookError> {
            self.handler
                .handle(self.command(event_id, event_type, object))
                .await
        }

        async fn member(&self) -> Member {
            self.members.all().await.remove(0)
        }
    }

    async fn seed_member(members: &InMemoryMemberRepository, role: MemberRole) -> Member {
        let member = Member::register(
            NewMember {
                email: Email::parse("pat@example.com").unwrap(),
                name: "Pat Member".to_string(),
                secondary_name: None,
                password_hash: PasswordHash::new("hash"),
                role,
                profile: MemberProfile::default(),
                stripe_customer_id: Some("cus_pat".to_string()),
            },
            Timestamp::now().add_days(30),
            PaymentRecord::completed(PaymentReference::payment_intent("pi_first"), 5000, "usd"),
        );
        members.insert(&member).await.unwrap();
        member
    }

    fn subscription(status: &str, cancel_at_period_end: bool) -> Value {
        json!({
            "id": "sub_1",
            "customer": "cus_pat",
            "status": status,
            "cancel_at_period_end": cancel_at_period_end
        })
    }

    fn invoice(id: &str) -> Value {
        json!({
            "id": id,
            "customer": "cus_pat",
            "subscription": "sub_1",
            "amount_paid": 5000,
            "amount_due": 5000,
            "currency": "usd"
        })
    }

    fn intent_object(id: &str, amount: i64, metadata: Value) -> Value {
        json!({
            "id": id,
            "amount": amount,
            "currency": "usd",
            "customer": "cus_pat",
            "status": "succeeded",
            "metadata": metadata
        })
    }

    fn renewal_metadata(role: &str) -> Value {
        json!({
            "purpose": "membership",
            "email": "pat@example.com",
            "role": role,
            "is_renewal": "true"
        })
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Authentication
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn tampered_body_is_rejected() {
        let f = fixture();
        seed_member(&f.members, MemberRole::Full).await;
        let mut cmd = f.command(
            "evt_1",
            "customer.subscription.deleted",
            subscription("canceled", false),
        );
        cmd.payload = String::from_utf8(cmd.payload)
            .unwrap()
            .replace("cus_pat", "cus_evil")
            .into_bytes();

        let err = f.handler.handle(cmd).await.unwrap_err();

        assert!(err.is_rejection());
        assert_eq!(f.member().await.membership_status, MembershipStatus::Active);
        assert_eq!(f.events.len().await, 0);
    }

    #[tokio::test]
    async fn untampered_body_is_accepted() {
        let f = fixture();
        let result = f.deliver("evt_1", "charge.refunded", json!({})).await.unwrap();
        assert!(matches!(result, HandlePaymentWebhookResult::Ignored { .. }));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Subscriptions
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn active_subscription_resets_expiry_from_now() {
        let f = fixture();
        let seeded = seed_member(&f.members, MemberRole::Full).await;
        let before = Timestamp::now();

        f.deliver("evt_1", "customer.subscription.updated", subscription("active", false))
            .await
            .unwrap();

        let member = f.member().await;
        assert_eq!(member.membership_status, MembershipStatus::Active);
        assert_eq!(member.subscription_status, Some(SubscriptionStatus::Active));
        let expiry = member.membership_expiry.unwrap();
        assert!(expiry >= before.add_days(365));
        assert!(expiry < seeded.membership_expiry.unwrap().add_days(365));
    }

    #[tokio::test]
    async fn cancel_at_period_end_marks_canceling() {
        let f = fixture();
        seed_member(&f.members, MemberRole::Full).await;

        f.deliver("evt_1", "customer.subscription.updated", subscription("active", true))
            .await
            .unwrap();

        assert_eq!(f.member().await.membership_status, MembershipStatus::Canceling);
    }

    #[tokio::test]
    async fn paused_and_unpaid_subscriptions() {
        let f = fixture();
        seed_member(&f.members, MemberRole::Full).await;

        f.deliver("evt_1", "customer.subscription.updated", subscription("paused", false))
            .await
            .unwrap();
        assert_eq!(f.member().await.membership_status, MembershipStatus::Paused);

        f.deliver("evt_2", "customer.subscription.updated", subscription("unpaid", false))
            .await
            .unwrap();
        assert_eq!(f.member().await.membership_status, MembershipStatus::Inactive);
    }

    #[tokio::test]
    async fn subscription_deleted_deactivates() {
        let f = fixture();
        seed_member(&f.members, MemberRole::Full).await;
        f.deliver("evt_1", "customer.subscription.created", subscription("active", false))
            .await
            .unwrap();

        f.deliver("evt_2", "customer.subscription.deleted", subscription("canceled", false))
            .await
            .unwrap();

        let member = f.member().await;
        assert_eq!(member.membership_status, MembershipStatus::Inactive);
        assert_eq!(member.subscription_status, Some(SubscriptionStatus::Canceled));
        assert!(member.stripe_subscription_id.is_none());
    }

    #[tokio::test]
    async fn unknown_customer_is_acknowledged() {
        let f = fixture();
        let result = f
            .deliver("evt_1", "customer.subscription.updated", subscription("active", false))
            .await
            .unwrap();

        assert!(matches!(result, HandlePaymentWebhookResult::Ignored { .. }));
        assert_eq!(f.events.get("evt_1").await.unwrap().outcome, WebhookOutcome::Ignored);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Invoices
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn invoice_paid_appends_once_across_event_ids() {
        let f = fixture();
        seed_member(&f.members, MemberRole::Full).await;

        f.deliver("evt_1", "invoice.payment_succeeded", invoice("in_1")).await.unwrap();
        f.deliver("evt_2", "invoice.paid", invoice("in_1")).await.unwrap();

        let member = f.member().await;
        assert_eq!(member.payment_history().len(), 2);
        assert!(member.has_completed_payment(&PaymentReference::invoice("in_1")));
    }

    #[tokio::test]
    async fn invoice_failed_marks_past_due() {
        let f = fixture();
        seed_member(&f.members, MemberRole::Full).await;

        f.deliver("evt_1", "invoice.payment_failed", invoice("in_2")).await.unwrap();

        let member = f.member().await;
        assert_eq!(member.subscription_status, Some(SubscriptionStatus::PastDue));
        assert_eq!(member.membership_status, MembershipStatus::Active);
        assert!(member.has_payment(
            &PaymentReference::invoice("in_2"),
            PaymentRecordStatus::Failed
        ));
    }

    #[tokio::test]
    async fn invoice_without_customer_is_bad_payload() {
        let f = fixture();
        let err = f
            .deliver("evt_1", "invoice.paid", json!({ "id": "in_1", "currency": "usd" }))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::MissingField("customer")));
        assert!(f.events.get("evt_1").await.is_none());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Redelivery
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn redelivered_event_is_noop() {
        let f = fixture();
        seed_member(&f.members, MemberRole::Full).await;
        let cmd = f.command("evt_1", "invoice.paid", invoice("in_1"));

        f.handler.handle(cmd.clone()).await.unwrap();
        let version = f.member().await.version;
        let second = f.handler.handle(cmd).await.unwrap();

        assert_eq!(
            second,
            HandlePaymentWebhookResult::Duplicate {
                event_id: "evt_1".to_string()
            }
        );
        assert_eq!(f.member().await.version, version);
    }

    #[tokio::test]
    async fn store_failure_is_retryable_and_not_recorded() {
        let f = fixture();
        seed_member(&f.members, MemberRole::Full).await;
        f.members
            .fail_next_update(DomainError::new(ErrorCode::DatabaseError, "connection reset"))
            .await;

        let err = f.deliver("evt_1", "invoice.paid", invoice("in_1")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(f.events.get("evt_1").await.is_none());

        f.deliver("evt_1", "invoice.paid", invoice("in_1")).await.unwrap();
        assert_eq!(f.member().await.payment_history().len(), 2);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Payment Intents
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn renewal_intent_renews_once() {
        let f = fixture();
        seed_member(&f.members, MemberRole::Full).await;
        let object = intent_object("pi_renew", 5000, renewal_metadata("full"));

        f.deliver("evt_1", "payment_intent.succeeded", object.clone()).await.unwrap();
        f.deliver("evt_2", "payment_intent.succeeded", object).await.unwrap();
        f.sender.settle().await;

        let member = f.member().await;
        assert_eq!(member.payment_history().len(), 2);
        assert!(member.has_completed_payment(&PaymentReference::payment_intent("pi_renew")));
        assert_eq!(f.sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn renewal_intent_with_wrong_amount_is_ignored() {
        let f = fixture();
        seed_member(&f.members, MemberRole::Full).await;

        let result = f
            .deliver(
                "evt_1",
                "payment_intent.succeeded",
                intent_object("pi_renew", 1000, renewal_metadata("full")),
            )
            .await
            .unwrap();

        assert!(matches!(result, HandlePaymentWebhookResult::Ignored { .. }));
        assert_eq!(f.member().await.payment_history().len(), 1);
    }

    #[tokio::test]
    async fn new_membership_intent_is_only_acknowledged() {
        let f = fixture();
        let metadata = json!({
            "purpose": "membership",
            "email": "new@example.com",
            "role": "full",
            "is_renewal": "false"
        });

        let result = f
            .deliver("evt_1", "payment_intent.succeeded", intent_object("pi_new", 5000, metadata))
            .await
            .unwrap();

        assert!(matches!(result, HandlePaymentWebhookResult::Ignored { .. }));
        assert_eq!(f.members.member_count().await, 0);
    }

    #[tokio::test]
    async fn failed_membership_intent_appends_failed_record() {
        let f = fixture();
        seed_member(&f.members, MemberRole::Full).await;

        f.deliver(
            "evt_1",
            "payment_intent.payment_failed",
            intent_object("pi_bad", 5000, renewal_metadata("full")),
        )
        .await
        .unwrap();

        let member = f.member().await;
        assert!(member.has_payment(
            &PaymentReference::payment_intent("pi_bad"),
            PaymentRecordStatus::Failed
        ));
        assert_eq!(member.membership_status, MembershipStatus::Active);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Event Registrations
    // ════════════════════════════════════════════════════════════════════════════

    fn event_registration(intent_id: Option<&str>) -> EventRegistration {
        EventRegistration::pending(
            "Annual Conference",
            Email::parse("guest@example.com").unwrap(),
            7500,
            "usd",
            intent_id.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn registration_completes_by_intent_id() {
        let f = fixture();
        let registration = event_registration(Some("pi_evt"));
        f.registrations.insert(&registration).await.unwrap();

        f.deliver(
            "evt_1",
            "payment_intent.succeeded",
            intent_object("pi_evt", 7500, json!({ "purpose": "event_registration" })),
        )
        .await
        .unwrap();

        let stored = f.registrations.find_by_id(&registration.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RegistrationStatus::Completed);
    }

    #[tokio::test]
    async fn registration_falls_back_to_metadata_id() {
        let f = fixture();
        let registration = event_registration(None);
        f.registrations.insert(&registration).await.unwrap();

        f.deliver(
            "evt_1",
            "payment_intent.succeeded",
            intent_object(
                "pi_evt",
                7500,
                json!({
                    "purpose": "event_registration",
                    "registration_id": registration.id.to_string()
                }),
            ),
        )
        .await
        .unwrap();

        let stored = f.registrations.find_by_id(&registration.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RegistrationStatus::Completed);
        assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_evt"));
    }

    #[tokio::test]
    async fn completed_registration_is_not_downgraded() {
        let f = fixture();
        let registration = event_registration(Some("pi_evt"));
        f.registrations.insert(&registration).await.unwrap();
        let tag = json!({ "purpose": "event_registration" });

        f.deliver("evt_1", "payment_intent.succeeded", intent_object("pi_evt", 7500, tag.clone()))
            .await
            .unwrap();
        f.deliver("evt_2", "payment_intent.payment_failed", intent_object("pi_evt", 7500, tag))
            .await
            .unwrap();

        let stored = f.registrations.find_by_id(&registration.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RegistrationStatus::Completed);
    }

    #[tokio::test]
    async fn canceled_intent_cancels_registration() {
        let f = fixture();
        let registration = event_registration(Some("pi_evt"));
        f.registrations.insert(&registration).await.unwrap();

        f.deliver(
            "evt_1",
            "payment_intent.canceled",
            intent_object("pi_evt", 7500, json!({ "purpose": "event_registration" })),
        )
        .await
        .unwrap();

        let stored = f.registrations.find_by_id(&registration.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RegistrationStatus::Canceled);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Ignored Events
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn intent_created_is_ignored_and_recorded() {
        let f = fixture();
        let result = f
            .deliver("evt_1", "payment_intent.created", intent_object("pi_1", 5000, json!({})))
            .await
            .unwrap();

        assert!(matches!(result, HandlePaymentWebhookResult::Ignored { .. }));
        assert!(f.events.contains("evt_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_mode_event_ignored_when_livemode_required() {
        let mut f = fixture();
        f.handler = f.handler.with_livemode_required(true);
        seed_member(&f.members, MemberRole::Full).await;

        let result = f.deliver("evt_1", "invoice.paid", invoice("in_1")).await.unwrap();

        assert!(matches!(result, HandlePaymentWebhookResult::Ignored { .. }));
        assert_eq!(f.member().await.payment_history().len(), 1);
    }
}
