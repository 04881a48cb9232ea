//! BeginPurchaseHandler - Command handler for starting a membership purchase.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::membership::{
    BillingAddress, Email, MemberRole, MembershipError, PricingResolver, PurchaseMetadata,
};
use crate::ports::{
    CreateCustomerRequest, CreatePaymentIntentRequest, MemberRepository, PaymentProvider,
};

use super::provider_call::with_single_retry;

/// Contact and billing details entered on the purchase form.
#[derive(Debug, Clone, Default)]
pub struct PurchaseProfile {
    pub name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub bcba_number: Option<String>,
    pub affiliation: Option<String>,
    pub billing_name: Option<String>,
    pub billing_address: Option<BillingAddress>,
}

/// Command to start a purchase.
#[derive(Debug, Clone)]
pub struct BeginPurchaseCommand {
    /// Role name as submitted; validated here.
    pub role: String,
    pub profile: PurchaseProfile,
    pub is_renewal: bool,
}

/// What the browser needs to confirm the payment.
#[derive(Debug, Clone)]
pub struct BeginPurchaseResult {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub customer_id: String,
    pub amount_cents: i64,
    pub currency: String,
}

/// Creates the provider customer and payment intent for a purchase.
///
/// Never writes to the member store. For renewals the existing member is
/// read to fill gaps in the submitted profile.
pub struct BeginPurchaseHandler {
    members: Arc<dyn MemberRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    pricing: Arc<PricingResolver>,
}

impl BeginPurchaseHandler {
    pub fn new(
        members: Arc<dyn MemberRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        pricing: Arc<PricingResolver>,
    ) -> Self {
        Self {
            members,
            payment_provider,
            pricing,
        }
    }

    #[tracing::instrument(skip_all, fields(role = %cmd.role, is_renewal = cmd.is_renewal))]
    pub async fn handle(
        &self,
        cmd: BeginPurchaseCommand,
    ) -> Result<BeginPurchaseResult, MembershipError> {
        // 1. Resolve the price before any side effect
        let role: MemberRole = cmd.role.parse()?;
        let price = self.pricing.price_for(role);
        let email = Email::parse(&cmd.profile.email)?;

        // 2. Complete the profile
        let profile = if cmd.is_renewal {
            self.prefill_from_member(&email, cmd.profile).await?
        } else {
            cmd.profile
        };
        let name = profile
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| MembershipError::validation("name", "is required"))?
            .to_string();

        // 3. Provider objects, keyed to this attempt so a retry cannot
        //    create duplicates
        let attempt = Uuid::new_v4();
        let metadata = PurchaseMetadata::membership(email.clone(), role, cmd.is_renewal).to_map();

        let customer_request = CreateCustomerRequest {
            email: email.to_string(),
            name: Some(profile.billing_name.clone().unwrap_or_else(|| name.clone())),
            phone: profile.phone.clone(),
            address: profile.billing_address.clone(),
            metadata: customer_metadata(&profile, &metadata),
            idempotency_key: Some(format!("customer-{}", attempt)),
        };
        let customer = with_single_retry("create_customer", || {
            self.payment_provider.create_customer(customer_request.clone())
        })
        .await?;

        let intent_request = CreatePaymentIntentRequest {
            customer_id: customer.id.clone(),
            amount_cents: price.amount_cents,
            currency: price.currency.clone(),
            description: Some(description(role, cmd.is_renewal)),
            metadata,
            idempotency_key: Some(format!("intent-{}", attempt)),
        };
        let intent = with_single_retry("create_payment_intent", || {
            self.payment_provider
                .create_payment_intent(intent_request.clone())
        })
        .await?;

        let client_secret = intent
            .client_secret
            .ok_or_else(|| MembershipError::payment_setup("payment intent has no client secret"))?;

        tracing::info!(
            payment_intent_id = %intent.id,
            customer_id = %customer.id,
            role = %role,
            is_renewal = cmd.is_renewal,
            amount_cents = price.amount_cents,
            "Purchase started"
        );

        Ok(BeginPurchaseResult {
            client_secret,
            payment_intent_id: intent.id,
            customer_id: customer.id,
            amount_cents: price.amount_cents,
            currency: price.currency,
        })
    }

    async fn prefill_from_member(
        &self,
        email: &Email,
        mut profile: PurchaseProfile,
    ) -> Result<PurchaseProfile, MembershipError> {
        // A renewal that cannot be finalized must not be charged.
        let member = self
            .members
            .find_by_email(email)
            .await?
            .ok_or_else(|| MembershipError::member_not_found(email.as_str()))?;

        let stored = member.profile;
        profile.name = profile.name.filter(|n| !n.trim().is_empty()).or(Some(member.name));
        profile.phone = profile.phone.or(stored.phone);
        profile.bcba_number = profile.bcba_number.or(stored.bcba_number);
        profile.affiliation = profile.affiliation.or(stored.affiliation);
        profile.billing_name = profile.billing_name.or(stored.billing_name);
        profile.billing_address = profile.billing_address.or(stored.billing_address);
        Ok(profile)
    }
}

fn description(role: MemberRole, is_renewal: bool) -> String {
    if is_renewal {
        format!("{} membership renewal", role.display_name())
    } else {
        format!("{} membership", role.display_name())
    }
}

fn customer_metadata(
    profile: &PurchaseProfile,
    purchase: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut metadata = purchase.clone();
    if let Some(bcba) = &profile.bcba_number {
        metadata.insert("bcba_number".to_string(), bcba.clone());
    }
    if let Some(affiliation) = &profile.affiliation {
        metadata.insert("affiliation".to_string(), affiliation.clone());
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryMemberRepository;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::domain::foundation::{ErrorCode, Timestamp};
    use crate::domain::membership::{
        Member, MemberProfile, NewMember, PasswordHash, PaymentRecord, PaymentReference,
    };
    use crate::ports::{PaymentError, PaymentIntentStatus};

    struct Fixture {
        members: InMemoryMemberRepository,
        provider: MockPaymentProvider,
        handler: BeginPurchaseHandler,
    }

    fn fixture() -> Fixture {
        let members = InMemoryMemberRepository::new();
        let provider = MockPaymentProvider::new();
        let handler = BeginPurchaseHandler::new(
            Arc::new(members.clone()),
            Arc::new(provider.clone()),
            Arc::new(PricingResolver::default()),
        );
        Fixture {
            members,
            provider,
            handler,
        }
    }

    fn command(role: &str, is_renewal: bool) -> BeginPurchaseCommand {
        BeginPurchaseCommand {
            role: role.to_string(),
            profile: PurchaseProfile {
                name: Some("Jane Doe".to_string()),
                email: "Jane@Example.com".to_string(),
                ..Default::default()
            },
            is_renewal,
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success Cases
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creates_customer_and_intent_for_role_price() {
        let f = fixture();

        let result = f.handler.handle(command("affiliate", false)).await.unwrap();

        assert_eq!(result.amount_cents, 2500);
        assert_eq!(result.currency, "usd");
        assert!(result.customer_id.starts_with("cus_"));
        let intent = f.provider.intent(&result.payment_intent_id).unwrap();
        assert_eq!(intent.status, PaymentIntentStatus::RequiresPaymentMethod);
        assert_eq!(intent.customer_id.as_deref(), Some(result.customer_id.as_str()));
        assert_eq!(intent.metadata.get("purpose").map(String::as_str), Some("membership"));
        assert_eq!(intent.metadata.get("email").map(String::as_str), Some("jane@example.com"));
        assert_eq!(intent.metadata.get("role").map(String::as_str), Some("affiliate"));
        assert_eq!(intent.metadata.get("is_renewal").map(String::as_str), Some("false"));
    }

    #[tokio::test]
    async fn new_purchase_does_not_touch_member_store() {
        let f = fixture();
        f.handler.handle(command("full", false)).await.unwrap();
        assert_eq!(f.members.member_count().await, 0);
    }

    #[tokio::test]
    async fn renewal_prefills_name_from_member() {
        let f = fixture();
        let member = Member::register(
            NewMember {
                email: Email::parse("jane@example.com").unwrap(),
                name: "Jane Stored".to_string(),
                secondary_name: None,
                password_hash: PasswordHash::new("hash"),
                role: MemberRole::Full,
                profile: MemberProfile::default(),
                stripe_customer_id: None,
            },
            Timestamp::now(),
            PaymentRecord::completed(PaymentReference::payment_intent("pi_0"), 5000, "usd"),
        );
        f.members.insert(&member).await.unwrap();

        let mut cmd = command("full", true);
        cmd.profile.name = None;
        f.handler.handle(cmd).await.unwrap();

        let call = &f.provider.calls()[0];
        assert_eq!(call.method, "create_customer");
        assert_eq!(call.args[1], "Jane Stored");
        assert_eq!(f.members.all().await[0].version, 1);
    }

    #[tokio::test]
    async fn transient_provider_failure_is_retried_without_duplicates() {
        let f = fixture();
        f.provider
            .fail_next("create_customer", PaymentError::network("connection reset"));

        f.handler.handle(command("full", false)).await.unwrap();

        assert_eq!(f.provider.call_count("create_customer"), 2);
        assert_eq!(f.provider.customer_count(), 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure Cases
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_role_fails_before_provider_calls() {
        let f = fixture();

        let err = f.handler.handle(command("platinum", false)).await.unwrap_err();

        assert_eq!(err, MembershipError::invalid_role("platinum"));
        assert!(f.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn renewal_without_member_fails_before_charging() {
        let f = fixture();

        let err = f.handler.handle(command("full", true)).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::MemberNotFound);
        assert!(!f.provider.was_called("create_payment_intent"));
    }

    #[tokio::test]
    async fn declined_setup_is_not_retried() {
        let f = fixture();
        f.provider.fail_next(
            "create_payment_intent",
            PaymentError::invalid_request("amount too small"),
        );

        let err = f.handler.handle(command("full", false)).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::PaymentSetupFailed);
        assert_eq!(f.provider.call_count("create_payment_intent"), 1);
    }

    #[tokio::test]
    async fn missing_name_is_validation_error() {
        let f = fixture();
        let mut cmd = command("full", false);
        cmd.profile.name = Some("   ".to_string());

        let err = f.handler.handle(cmd).await.unwrap_err();

        assert_eq!(err, MembershipError::validation("name", "is required"));
    }
}
