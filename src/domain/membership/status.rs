//! Membership and subscription status.
//!
//! `MembershipStatus` is the portal's view of a member's standing.
//! `SubscriptionStatus` mirrors the provider's subscription state when the
//! member pays through a recurring subscription.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Standing of a member in the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Paid and within the membership period.
    Active,

    /// Lapsed, canceled or never paid.
    Inactive,

    /// Subscription set to cancel at period end. Access continues until then.
    Canceling,

    /// Provider has paused collection.
    Paused,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Inactive => "inactive",
            MembershipStatus::Canceling => "canceling",
            MembershipStatus::Paused => "paused",
        }
    }

    /// Parses a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(MembershipStatus::Active),
            "inactive" => Some(MembershipStatus::Inactive),
            "canceling" => Some(MembershipStatus::Canceling),
            "paused" => Some(MembershipStatus::Paused),
            _ => None,
        }
    }

    /// Returns true if this status grants member benefits.
    pub fn has_access(&self) -> bool {
        matches!(self, MembershipStatus::Active | MembershipStatus::Canceling)
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider-side subscription state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    PastDue,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Paused => "paused",
        }
    }

    /// Maps a Stripe subscription status string.
    ///
    /// Stripe's `trialing` counts as active; `incomplete_expired` as
    /// canceled. `incomplete` has no portal meaning and yields `None`.
    pub fn from_provider(s: &str) -> Option<Self> {
        match s {
            "active" | "trialing" => Some(SubscriptionStatus::Active),
            "canceled" | "incomplete_expired" => Some(SubscriptionStatus::Canceled),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "unpaid" => Some(SubscriptionStatus::Unpaid),
            "paused" => Some(SubscriptionStatus::Paused),
            _ => None,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_and_canceling_have_access() {
        assert!(MembershipStatus::Active.has_access());
        assert!(MembershipStatus::Canceling.has_access());
        assert!(!MembershipStatus::Inactive.has_access());
        assert!(!MembershipStatus::Paused.has_access());
    }

    #[test]
    fn membership_status_parses_its_own_output() {
        for status in [
            MembershipStatus::Active,
            MembershipStatus::Inactive,
            MembershipStatus::Canceling,
            MembershipStatus::Paused,
        ] {
            assert_eq!(MembershipStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MembershipStatus::parse("expired"), None);
    }

    #[test]
    fn provider_trialing_maps_to_active() {
        assert_eq!(
            SubscriptionStatus::from_provider("trialing"),
            Some(SubscriptionStatus::Active)
        );
    }

    #[test]
    fn provider_incomplete_is_unmapped() {
        assert_eq!(SubscriptionStatus::from_provider("incomplete"), None);
    }

    #[test]
    fn subscription_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SubscriptionStatus::PastDue).unwrap(),
            "\"past_due\""
        );
    }
}
