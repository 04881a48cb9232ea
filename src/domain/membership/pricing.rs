//! Pricing resolver.
//!
//! Pure lookups from a role to its price and membership duration. Amounts
//! are integer cents everywhere; conversion to major units happens only
//! when formatting for display.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, ValidationError};

use super::MemberRole;

/// Currency every membership is charged in.
pub const MEMBERSHIP_CURRENCY: &str = "usd";

/// Price of a membership role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipPrice {
    /// Stripe price object id for this role.
    pub provider_price_id: String,
    pub amount_cents: i64,
    pub currency: String,
}

impl MembershipPrice {
    /// Formats the amount in major units, e.g. `5000` -> `"50.00"`.
    pub fn display_amount(&self) -> String {
        format_cents(self.amount_cents)
    }
}

/// Formats integer cents as a major-unit string.
pub fn format_cents(amount_cents: i64) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Provider price ids per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPriceIds {
    pub full: String,
    pub affiliate: String,
    pub studentbt: String,
}

impl Default for ProviderPriceIds {
    fn default() -> Self {
        Self {
            full: "price_membership_full".to_string(),
            affiliate: "price_membership_affiliate".to_string(),
            studentbt: "price_membership_studentbt".to_string(),
        }
    }
}

/// Resolves prices, durations and expiry dates for membership roles.
#[derive(Debug, Clone, Default)]
pub struct PricingResolver {
    price_ids: ProviderPriceIds,
}

impl PricingResolver {
    pub fn new(price_ids: ProviderPriceIds) -> Self {
        Self { price_ids }
    }

    /// Returns the price of a role.
    pub fn price_for(&self, role: MemberRole) -> MembershipPrice {
        let provider_price_id = match role {
            MemberRole::Full => &self.price_ids.full,
            MemberRole::Affiliate => &self.price_ids.affiliate,
            MemberRole::StudentBt => &self.price_ids.studentbt,
        };
        MembershipPrice {
            provider_price_id: provider_price_id.clone(),
            amount_cents: amount_cents_for(role),
            currency: MEMBERSHIP_CURRENCY.to_string(),
        }
    }

    /// Returns the price of a role given by name.
    ///
    /// # Errors
    ///
    /// `ValidationError::InvalidRole` when the name is not a known role.
    pub fn price_for_name(&self, role: &str) -> Result<MembershipPrice, ValidationError> {
        let role: MemberRole = role.parse()?;
        Ok(self.price_for(role))
    }

    /// Number of days one payment buys.
    pub fn membership_duration_days(&self, role: MemberRole) -> i64 {
        match role {
            MemberRole::Full => 365,
            MemberRole::Affiliate => 365,
            MemberRole::StudentBt => 365,
        }
    }

    /// Expiry of a membership starting at `start`.
    pub fn compute_expiry(&self, role: MemberRole, start: Timestamp) -> Timestamp {
        start.add_days(self.membership_duration_days(role))
    }
}

fn amount_cents_for(role: MemberRole) -> i64 {
    match role {
        MemberRole::Full => 5000,
        MemberRole::Affiliate => 2500,
        MemberRole::StudentBt => 1000,
    }
}
