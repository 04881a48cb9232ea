//! FinalizePurchaseHandler - turns a verified payment into membership state.
//!
//! This is the only client-driven path that writes members. The client's own
//! view of the payment is never trusted: the intent is re-fetched from the
//! provider and must report `succeeded` before anything is written.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::application::KeyedLocks;
use crate::domain::foundation::{MemberId, Timestamp};
use crate::domain::membership::{
    Email, Member, MemberProfile, MemberRole, MembershipError, NewMember, PasswordHash,
    PricingResolver, PurchaseMetadata, PurchasePurpose,
};
use crate::ports::{
    ConfirmationKind, ConfirmationSender, InsertOutcome, MemberRepository, PasswordHasher,
    PaymentIntent, PaymentProvider,
};

use super::provider_call::with_single_retry;
use super::renewal::{
    apply_renewal, ensure_amount_matches, spawn_confirmation, RenewalOutcome, VerifiedPayment,
    MAX_WRITE_ATTEMPTS,
};

/// Command to finalize a purchase after client-side confirmation.
#[derive(Debug, Clone)]
pub struct FinalizePurchaseCommand {
    pub payment_intent_id: String,
    pub email: String,
    pub is_renewal: bool,
    /// Required for new registrations. For renewals, defaults to the role
    /// recorded on the intent, then to the member's current role.
    pub role: Option<String>,
    pub name: Option<String>,
    pub secondary_name: Option<String>,
    pub profile: MemberProfile,
    /// Required for new registrations; ignored for renewals.
    pub password: Option<SecretString>,
}

/// What finalize did to the member store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Created,
    Renewed,
}

impl FinalizeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizeOutcome::Created => "created",
            FinalizeOutcome::Renewed => "renewed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FinalizePurchaseResult {
    pub member_id: MemberId,
    pub outcome: FinalizeOutcome,
    /// True when this intent had already been applied and nothing was written.
    pub already_applied: bool,
    pub membership_expiry: Option<Timestamp>,
}

impl FinalizePurchaseResult {
    fn from_member(member: &Member, outcome: FinalizeOutcome, already_applied: bool) -> Self {
        Self {
            member_id: member.id,
            outcome,
            already_applied,
            membership_expiry: member.membership_expiry,
        }
    }
}

/// Validated new-registration fields.
struct Registration {
    role: MemberRole,
    name: String,
    password: SecretString,
}

pub struct FinalizePurchaseHandler {
    members: Arc<dyn MemberRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    password_hasher: Arc<dyn PasswordHasher>,
    confirmations: Arc<dyn ConfirmationSender>,
    pricing: Arc<PricingResolver>,
    locks: KeyedLocks,
}

impl FinalizePurchaseHandler {
    pub fn new(
        members: Arc<dyn MemberRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        password_hasher: Arc<dyn PasswordHasher>,
        confirmations: Arc<dyn ConfirmationSender>,
        pricing: Arc<PricingResolver>,
        locks: KeyedLocks,
    ) -> Self {
        Self {
            members,
            payment_provider,
            password_hasher,
            confirmations,
            pricing,
            locks,
        }
    }

    #[tracing::instrument(
        skip_all,
        fields(payment_intent_id = %cmd.payment_intent_id, is_renewal = cmd.is_renewal)
    )]
    pub async fn handle(
        &self,
        cmd: FinalizePurchaseCommand,
    ) -> Result<FinalizePurchaseResult, MembershipError> {
        // 1. Validate input
        if cmd.payment_intent_id.trim().is_empty() {
            return Err(MembershipError::validation("paymentIntentId", "is required"));
        }
        let email = Email::parse(&cmd.email)?;
        let requested_role = cmd
            .role
            .as_deref()
            .map(str::parse::<MemberRole>)
            .transpose()?;
        let registration = if cmd.is_renewal {
            None
        } else {
            Some(validate_registration(&cmd, requested_role)?)
        };

        // 2. Re-verify with the provider
        let intent = with_single_retry("retrieve_payment_intent", || {
            self.payment_provider
                .retrieve_payment_intent(&cmd.payment_intent_id)
        })
        .await?;
        if !intent.is_succeeded() {
            tracing::warn!(
                payment_intent_id = %intent.id,
                status = intent.status.as_str(),
                "Finalize called for an intent that has not succeeded"
            );
            return Err(MembershipError::payment_not_completed(
                &intent.id,
                intent.status.as_str(),
            ));
        }
        let metadata = check_metadata(&intent, &email, cmd.is_renewal)?;
        let payment = VerifiedPayment {
            payment_intent_id: intent.id.clone(),
            amount_cents: intent.amount_cents,
            currency: intent.currency.clone(),
            customer_id: intent.customer_id.clone(),
        };

        // 3. Read-verify-write under the member's lock
        let _guard = self.locks.acquire(email.as_str()).await;
        match registration {
            None => {
                let role = requested_role.or(metadata.role);
                self.renew(&email, role, &payment).await
            }
            Some(registration) => self.register(&cmd, email, registration, &payment).await,
        }
    }

    async fn renew(
        &self,
        email: &Email,
        role: Option<MemberRole>,
        payment: &VerifiedPayment,
    ) -> Result<FinalizePurchaseResult, MembershipError> {
        match apply_renewal(self.members.as_ref(), &self.pricing, email, role, payment).await? {
            RenewalOutcome::Applied(member) => {
                tracing::info!(
                    member_id = %member.id,
                    payment_intent_id = %payment.payment_intent_id,
                    role = %member.role,
                    "Membership renewed"
                );
                spawn_confirmation(
                    Arc::clone(&self.confirmations),
                    &member,
                    ConfirmationKind::Renewal,
                    payment,
                );
                Ok(FinalizePurchaseResult::from_member(
                    &member,
                    FinalizeOutcome::Renewed,
                    false,
                ))
            }
            RenewalOutcome::AlreadyApplied(member) => Ok(FinalizePurchaseResult::from_member(
                &member,
                FinalizeOutcome::Renewed,
                true,
            )),
        }
    }

    async fn register(
        &self,
        cmd: &FinalizePurchaseCommand,
        email: Email,
        registration: Registration,
        payment: &VerifiedPayment,
    ) -> Result<FinalizePurchaseResult, MembershipError> {
        ensure_amount_matches(&self.pricing, registration.role, payment)?;
        let reference = payment.reference();
        let mut password_hash: Option<PasswordHash> = None;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            if let Some(existing) = self.members.find_by_email(&email).await? {
                if existing.has_completed_payment(&reference) {
                    tracing::debug!(
                        member_id = %existing.id,
                        payment_intent_id = %payment.payment_intent_id,
                        "Registration already finalized"
                    );
                    return Ok(FinalizePurchaseResult::from_member(
                        &existing,
                        FinalizeOutcome::Created,
                        true,
                    ));
                }
                return Err(MembershipError::duplicate_member(email.as_str()));
            }

            let hash = match &password_hash {
                Some(hash) => hash.clone(),
                None => {
                    let hash = self
                        .password_hasher
                        .hash(registration.password.expose_secret())
                        .await?;
                    password_hash = Some(hash.clone());
                    hash
                }
            };

            let expiry = self
                .pricing
                .compute_expiry(registration.role, Timestamp::now());
            let member = Member::register(
                NewMember {
                    email: email.clone(),
                    name: registration.name.clone(),
                    secondary_name: cmd.secondary_name.clone(),
                    password_hash: hash,
                    role: registration.role,
                    profile: cmd.profile.clone(),
                    stripe_customer_id: payment.customer_id.clone(),
                },
                expiry,
                payment.completed_record(),
            );

            match self.members.insert(&member).await? {
                InsertOutcome::Inserted => {
                    tracing::info!(
                        member_id = %member.id,
                        payment_intent_id = %payment.payment_intent_id,
                        role = %member.role,
                        "Member registered"
                    );
                    spawn_confirmation(
                        Arc::clone(&self.confirmations),
                        &member,
                        ConfirmationKind::Registration,
                        payment,
                    );
                    return Ok(FinalizePurchaseResult::from_member(
                        &member,
                        FinalizeOutcome::Created,
                        false,
                    ));
                }
                InsertOutcome::AlreadyExists => {
                    tracing::debug!(attempt, "Email registered concurrently, re-reading");
                }
            }
        }

        Err(MembershipError::infrastructure(
            "could not settle registration against concurrent writers",
        ))
    }
}

fn validate_registration(
    cmd: &FinalizePurchaseCommand,
    role: Option<MemberRole>,
) -> Result<Registration, MembershipError> {
    let role = role.ok_or_else(|| MembershipError::validation("role", "is required"))?;
    let name = cmd
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| MembershipError::validation("name", "is required"))?
        .to_string();
    let password = cmd
        .password
        .clone()
        .filter(|p| !p.expose_secret().is_empty())
        .ok_or_else(|| MembershipError::validation("password", "is required"))?;
    Ok(Registration {
        role,
        name,
        password,
    })
}

/// Accepts only intents the portal tagged for this buyer and this flow.
///
/// The tagged email binds a payment to one member, so a succeeded intent
/// cannot be replayed under another address.
fn check_metadata(
    intent: &PaymentIntent,
    email: &Email,
    is_renewal: bool,
) -> Result<PurchaseMetadata, MembershipError> {
    let metadata = PurchaseMetadata::from_map(&intent.metadata).ok_or_else(|| {
        MembershipError::payment_mismatch("payment was not created by a membership purchase")
    })?;
    if metadata.purpose != PurchasePurpose::Membership {
        return Err(MembershipError::payment_mismatch(
            "payment was not made for a membership",
        ));
    }
    match &metadata.email {
        Some(paid_by) if paid_by == email => {}
        Some(_) => {
            return Err(MembershipError::payment_mismatch(
                "payment belongs to a different email",
            ))
        }
        None => {
            return Err(MembershipError::payment_mismatch(
                "payment does not name a valid buyer email",
            ))
        }
    }
    if metadata.is_renewal != is_renewal {
        return Err(MembershipError::payment_mismatch(
            "payment was made for a different purchase type",
        ));
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryMemberRepository;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::application::handlers::membership::test_support::{RecordingSender, StubHasher};
    use crate::domain::foundation::ErrorCode;
    use crate::domain::membership::{
        MembershipStatus, PaymentRecord, PaymentReference, PurchaseMetadata,
    };
    use crate::ports::{PaymentError, PaymentIntentStatus};
    use std::collections::HashMap;

    struct Fixture {
        members: InMemoryMemberRepository,
        provider: MockPaymentProvider,
        sender: RecordingSender,
        handler: Arc<FinalizePurchaseHandler>,
    }

    fn fixture_with_sender(sender: RecordingSender) -> Fixture {
        let members = InMemoryMemberRepository::new();
        let provider = MockPaymentProvider::new();
        let handler = FinalizePurchaseHandler::new(
            Arc::new(members.clone()),
            Arc::new(provider.clone()),
            Arc::new(StubHasher),
            Arc::new(sender.clone()),
            Arc::new(PricingResolver::default()),
            KeyedLocks::new(),
        );
        Fixture {
            members,
            provider,
            sender,
            handler: Arc::new(handler),
        }
    }

    fn fixture() -> Fixture {
        fixture_with_sender(RecordingSender::default())
    }

    fn intent(
        id: &str,
        email: &str,
        role: MemberRole,
        is_renewal: bool,
        amount_cents: i64,
        status: PaymentIntentStatus,
    ) -> PaymentIntent {
        PaymentIntent {
            id: id.to_string(),
            client_secret: Some(format!("{}_secret", id)),
            amount_cents,
            currency: "usd".to_string(),
            customer_id: Some("cus_1".to_string()),
            status,
            metadata: PurchaseMetadata::membership(Email::parse(email).unwrap(), role, is_renewal)
                .to_map(),
        }
    }

    fn new_registration(intent_id: &str, email: &str, role: &str) -> FinalizePurchaseCommand {
        FinalizePurchaseCommand {
            payment_intent_id: intent_id.to_string(),
            email: email.to_string(),
            is_renewal: false,
            role: Some(role.to_string()),
            name: Some("Jane Doe".to_string()),
            secondary_name: None,
            profile: MemberProfile::default(),
            password: Some(SecretString::new("correct horse".to_string())),
        }
    }

    fn renewal(intent_id: &str, email: &str) -> FinalizePurchaseCommand {
        FinalizePurchaseCommand {
            payment_intent_id: intent_id.to_string(),
            email: email.to_string(),
            is_renewal: true,
            role: None,
            name: None,
            secondary_name: None,
            profile: MemberProfile::default(),
            password: None,
        }
    }

    async fn seed_expired_member(
        members: &InMemoryMemberRepository,
        email: &str,
        role: MemberRole,
    ) {
        let mut member = Member::register(
            NewMember {
                email: Email::parse(email).unwrap(),
                name: "Existing Member".to_string(),
                secondary_name: None,
                password_hash: PasswordHash::new("hash"),
                role,
                profile: MemberProfile::default(),
                stripe_customer_id: None,
            },
            Timestamp::now().add_days(-30),
            PaymentRecord::completed(PaymentReference::payment_intent("pi_old"), 1000, "usd"),
        );
        member.membership_status = MembershipStatus::Inactive;
        members.insert(&member).await.unwrap();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // New Registration
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn new_full_registration_creates_active_member() {
        let f = fixture();
        f.provider.insert_intent(intent(
            "pi_1",
            "jane@example.com",
            MemberRole::Full,
            false,
            5000,
            PaymentIntentStatus::Succeeded,
        ));
        let before = Timestamp::now();

        let result = f
            .handler
            .handle(new_registration("pi_1", "jane@example.com", "full"))
            .await
            .unwrap();

        assert_eq!(result.outcome, FinalizeOutcome::Created);
        assert!(!result.already_applied);
        let member = f.members.find_by_id(&result.member_id).await.unwrap().unwrap();
        assert_eq!(member.role, MemberRole::Full);
        assert_eq!(member.membership_status, MembershipStatus::Active);
        assert!(member.membership_expiry.unwrap() >= before.add_days(365));
        assert_eq!(member.payment_history().len(), 1);
        assert_eq!(member.stripe_customer_id.as_deref(), Some("cus_1"));
        assert_ne!(member.password_hash.as_str(), "correct horse");
    }

    #[tokio::test]
    async fn registration_sends_confirmation() {
        let f = fixture();
        f.provider.insert_intent(intent(
            "pi_1",
            "jane@example.com",
            MemberRole::Affiliate,
            false,
            2500,
            PaymentIntentStatus::Succeeded,
        ));

        f.handler
            .handle(new_registration("pi_1", "jane@example.com", "affiliate"))
            .await
            .unwrap();
        f.sender.settle().await;

        let sent = f.sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, ConfirmationKind::Registration);
        assert_eq!(sent[0].amount_cents, 2500);
    }

    #[tokio::test]
    async fn confirmation_failure_does_not_fail_purchase() {
        let f = fixture_with_sender(RecordingSender::failing());
        f.provider.insert_intent(intent(
            "pi_1",
            "jane@example.com",
            MemberRole::Full,
            false,
            5000,
            PaymentIntentStatus::Succeeded,
        ));

        let result = f
            .handler
            .handle(new_registration("pi_1", "jane@example.com", "full"))
            .await;
        f.sender.settle().await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn existing_email_is_duplicate_and_not_written() {
        let f = fixture();
        seed_expired_member(&f.members, "jane@example.com", MemberRole::Full).await;
        f.provider.insert_intent(intent(
            "pi_1",
            "jane@example.com",
            MemberRole::Full,
            false,
            5000,
            PaymentIntentStatus::Succeeded,
        ));

        let err = f
            .handler
            .handle(new_registration("pi_1", "jane@example.com", "full"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::DuplicateMember);
        let stored = f.members.all().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].version, 1);
        assert_eq!(stored[0].payment_history().len(), 1);
    }

    #[tokio::test]
    async fn repeated_finalize_is_idempotent() {
        let f = fixture();
        f.provider.insert_intent(intent(
            "pi_1",
            "jane@example.com",
            MemberRole::Full,
            false,
            5000,
            PaymentIntentStatus::Succeeded,
        ));
        let cmd = new_registration("pi_1", "jane@example.com", "full");

        let first = f.handler.handle(cmd.clone()).await.unwrap();
        let second = f.handler.handle(cmd).await.unwrap();

        assert_eq!(first.member_id, second.member_id);
        assert!(second.already_applied);
        assert_eq!(f.members.member_count().await, 1);
        assert_eq!(f.members.all().await[0].payment_history().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_finalize_creates_one_member() {
        let f = fixture();
        f.provider.insert_intent(intent(
            "pi_1",
            "jane@example.com",
            MemberRole::Full,
            false,
            5000,
            PaymentIntentStatus::Succeeded,
        ));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let handler = Arc::clone(&f.handler);
                tokio::spawn(async move {
                    handler
                        .handle(new_registration("pi_1", "jane@example.com", "full"))
                        .await
                })
            })
            .collect();

        let mut fresh = 0;
        for task in tasks {
            let result = task.await.unwrap().unwrap();
            if !result.already_applied {
                fresh += 1;
            }
        }

        assert_eq!(fresh, 1);
        assert_eq!(f.members.member_count().await, 1);
        assert_eq!(f.members.all().await[0].payment_history().len(), 1);
    }

    #[tokio::test]
    async fn wrong_amount_is_mismatch() {
        let f = fixture();
        f.provider.insert_intent(intent(
            "pi_1",
            "jane@example.com",
            MemberRole::StudentBt,
            false,
            1000,
            PaymentIntentStatus::Succeeded,
        ));

        let err = f
            .handler
            .handle(new_registration("pi_1", "jane@example.com", "full"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PaymentMismatch);
        assert_eq!(f.members.member_count().await, 0);
    }

    #[tokio::test]
    async fn intent_for_other_email_is_mismatch() {
        let f = fixture();
        f.provider.insert_intent(intent(
            "pi_1",
            "someone@example.com",
            MemberRole::Full,
            false,
            5000,
            PaymentIntentStatus::Succeeded,
        ));

        let err = f
            .handler
            .handle(new_registration("pi_1", "jane@example.com", "full"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PaymentMismatch);
    }

    #[tokio::test]
    async fn missing_password_is_rejected_before_provider_call() {
        let f = fixture();
        let mut cmd = new_registration("pi_1", "jane@example.com", "full");
        cmd.password = None;

        let err = f.handler.handle(cmd).await.unwrap_err();

        assert_eq!(err, MembershipError::validation("password", "is required"));
        assert!(f.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_role_is_rejected() {
        let f = fixture();
        let err = f
            .handler
            .handle(new_registration("pi_1", "jane@example.com", "gold"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRole);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Payment Verification
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unconfirmed_intent_fails_closed() {
        for status in [
            PaymentIntentStatus::RequiresPaymentMethod,
            PaymentIntentStatus::RequiresAction,
            PaymentIntentStatus::Processing,
            PaymentIntentStatus::Canceled,
        ] {
            let f = fixture();
            f.provider.insert_intent(intent(
                "pi_1",
                "jane@example.com",
                MemberRole::Full,
                false,
                5000,
                status,
            ));

            let err = f
                .handler
                .handle(new_registration("pi_1", "jane@example.com", "full"))
                .await
                .unwrap_err();

            assert_eq!(err.code(), ErrorCode::PaymentNotCompleted);
            assert_eq!(f.members.member_count().await, 0);
        }
    }

    #[tokio::test]
    async fn provider_outage_is_retryable() {
        let f = fixture();
        f.provider
            .fail_next("retrieve_payment_intent", PaymentError::network("timeout"));
        f.provider
            .fail_next("retrieve_payment_intent", PaymentError::network("timeout"));

        let err = f
            .handler
            .handle(new_registration("pi_1", "jane@example.com", "full"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PaymentProviderUnavailable);
        assert!(err.is_retryable());
        assert_eq!(f.provider.call_count("retrieve_payment_intent"), 2);
    }

    #[tokio::test]
    async fn untagged_intent_is_mismatch() {
        let f = fixture();
        let mut untagged = intent(
            "pi_1",
            "jane@example.com",
            MemberRole::Full,
            false,
            5000,
            PaymentIntentStatus::Succeeded,
        );
        untagged.metadata = HashMap::new();
        f.provider.insert_intent(untagged);

        let err = f
            .handler
            .handle(new_registration("pi_1", "jane@example.com", "full"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PaymentMismatch);
        assert_eq!(f.members.member_count().await, 0);
    }

    #[tokio::test]
    async fn malformed_metadata_email_is_mismatch() {
        let f = fixture();
        let mut tagged = intent(
            "pi_1",
            "jane@example.com",
            MemberRole::Full,
            false,
            5000,
            PaymentIntentStatus::Succeeded,
        );
        tagged
            .metadata
            .insert("email".to_string(), "not-an-email".to_string());
        f.provider.insert_intent(tagged);

        let err = f
            .handler
            .handle(new_registration("pi_1", "jane@example.com", "full"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PaymentMismatch);
        assert_eq!(f.members.member_count().await, 0);
    }

    #[tokio::test]
    async fn one_intent_cannot_register_two_emails() {
        let f = fixture();
        f.provider.insert_intent(intent(
            "pi_shared",
            "a@example.com",
            MemberRole::Full,
            false,
            5000,
            PaymentIntentStatus::Succeeded,
        ));

        f.handler
            .handle(new_registration("pi_shared", "a@example.com", "full"))
            .await
            .unwrap();
        let err = f
            .handler
            .handle(new_registration("pi_shared", "b@example.com", "full"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PaymentMismatch);
        assert_eq!(f.members.member_count().await, 1);
        assert_eq!(f.members.all().await[0].email.as_str(), "a@example.com");
    }

    #[tokio::test]
    async fn registration_intent_cannot_renew() {
        let f = fixture();
        seed_expired_member(&f.members, "sam@example.com", MemberRole::Full).await;
        f.provider.insert_intent(intent(
            "pi_new",
            "sam@example.com",
            MemberRole::Full,
            false,
            5000,
            PaymentIntentStatus::Succeeded,
        ));

        let err = f
            .handler
            .handle(renewal("pi_new", "sam@example.com"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PaymentMismatch);
        let stored = f.members.all().await;
        assert_eq!(stored[0].version, 1);
        assert_eq!(stored[0].payment_history().len(), 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Renewal
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn renewal_of_expired_studentbt_member() {
        let f = fixture();
        seed_expired_member(&f.members, "sam@example.com", MemberRole::StudentBt).await;
        f.provider.insert_intent(intent(
            "pi_2",
            "sam@example.com",
            MemberRole::StudentBt,
            true,
            1000,
            PaymentIntentStatus::Succeeded,
        ));
        let before = Timestamp::now();

        let result = f.handler.handle(renewal("pi_2", "sam@example.com")).await.unwrap();

        assert_eq!(result.outcome, FinalizeOutcome::Renewed);
        let member = f.members.find_by_id(&result.member_id).await.unwrap().unwrap();
        assert_eq!(member.membership_status, MembershipStatus::Active);
        assert!(member.membership_expiry.unwrap() >= before.add_days(365));
        assert_eq!(member.payment_history().len(), 2);
        assert_eq!(member.stripe_customer_id.as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn renewal_twice_appends_one_record() {
        let f = fixture();
        seed_expired_member(&f.members, "sam@example.com", MemberRole::StudentBt).await;
        f.provider.insert_intent(intent(
            "pi_2",
            "sam@example.com",
            MemberRole::StudentBt,
            true,
            1000,
            PaymentIntentStatus::Succeeded,
        ));

        f.handler.handle(renewal("pi_2", "sam@example.com")).await.unwrap();
        let after_first = f.members.all().await[0].clone();
        let second = f.handler.handle(renewal("pi_2", "sam@example.com")).await.unwrap();
        let after_second = f.members.all().await[0].clone();

        assert!(second.already_applied);
        assert_eq!(after_second.payment_history().len(), 2);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn renewal_without_member_is_not_found() {
        let f = fixture();
        f.provider.insert_intent(intent(
            "pi_2",
            "ghost@example.com",
            MemberRole::Full,
            true,
            5000,
            PaymentIntentStatus::Succeeded,
        ));

        let err = f.handler.handle(renewal("pi_2", "ghost@example.com")).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::MemberNotFound);
        assert_eq!(f.members.member_count().await, 0);
    }

    #[tokio::test]
    async fn renewal_uses_role_from_intent() {
        let f = fixture();
        seed_expired_member(&f.members, "sam@example.com", MemberRole::StudentBt).await;
        f.provider.insert_intent(intent(
            "pi_2",
            "sam@example.com",
            MemberRole::Full,
            true,
            5000,
            PaymentIntentStatus::Succeeded,
        ));

        f.handler.handle(renewal("pi_2", "sam@example.com")).await.unwrap();

        assert_eq!(f.members.all().await[0].role, MemberRole::Full);
    }
}
