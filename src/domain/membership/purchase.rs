//! Metadata attached to payment intents.
//!
//! The portal tags every intent it creates so webhook deliveries can be
//! routed back to the flow that created them.

use std::collections::HashMap;

use super::{Email, MemberRole};

pub const META_PURPOSE: &str = "purpose";
pub const META_EMAIL: &str = "email";
pub const META_ROLE: &str = "role";
pub const META_IS_RENEWAL: &str = "is_renewal";
pub const META_REGISTRATION_ID: &str = "registration_id";

/// Which purchase flow created an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchasePurpose {
    Membership,
    EventRegistration,
}

impl PurchasePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchasePurpose::Membership => "membership",
            PurchasePurpose::EventRegistration => "event_registration",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "membership" => Some(PurchasePurpose::Membership),
            "event_registration" => Some(PurchasePurpose::EventRegistration),
            _ => None,
        }
    }
}

/// Typed view over intent metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseMetadata {
    pub purpose: PurchasePurpose,
    pub email: Option<Email>,
    pub role: Option<MemberRole>,
    pub is_renewal: bool,
    pub registration_id: Option<String>,
}

impl PurchaseMetadata {
    pub fn membership(email: Email, role: MemberRole, is_renewal: bool) -> Self {
        Self {
            purpose: PurchasePurpose::Membership,
            email: Some(email),
            role: Some(role),
            is_renewal,
            registration_id: None,
        }
    }

    /// Reads the metadata map Stripe echoes back.
    ///
    /// Returns `None` for intents the portal did not tag. Malformed
    /// optional fields are dropped rather than failing the whole read.
    pub fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        let purpose = map.get(META_PURPOSE).and_then(|p| PurchasePurpose::parse(p))?;
        Some(Self {
            purpose,
            email: map.get(META_EMAIL).and_then(|e| Email::parse(e).ok()),
            role: map.get(META_ROLE).and_then(|r| r.parse().ok()),
            is_renewal: map.get(META_IS_RENEWAL).map(|v| v == "true").unwrap_or(false),
            registration_id: map.get(META_REGISTRATION_ID).cloned(),
        })
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(META_PURPOSE.to_string(), self.purpose.as_str().to_string());
        if let Some(email) = &self.email {
            map.insert(META_EMAIL.to_string(), email.to_string());
        }
        if let Some(role) = self.role {
            map.insert(META_ROLE.to_string(), role.as_str().to_string());
        }
        map.insert(META_IS_RENEWAL.to_string(), self.is_renewal.to_string());
        if let Some(id) = &self.registration_id {
            map.insert(META_REGISTRATION_ID.to_string(), id.clone());
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_metadata_writes_all_keys() {
        let meta = PurchaseMetadata::membership(
            Email::parse("a@b.co").unwrap(),
            MemberRole::Affiliate,
            true,
        );
        let map = meta.to_map();
        assert_eq!(map.get("purpose").map(String::as_str), Some("membership"));
        assert_eq!(map.get("email").map(String::as_str), Some("a@b.co"));
        assert_eq!(map.get("role").map(String::as_str), Some("affiliate"));
        assert_eq!(map.get("is_renewal").map(String::as_str), Some("true"));
        assert!(!map.contains_key("registration_id"));
    }

    #[test]
    fn untagged_intent_yields_none() {
        assert!(PurchaseMetadata::from_map(&HashMap::new()).is_none());
    }

    #[test]
    fn event_registration_metadata_parses() {
        let mut map = HashMap::new();
        map.insert("purpose".to_string(), "event_registration".to_string());
        map.insert("registration_id".to_string(), "reg-1".to_string());

        let meta = PurchaseMetadata::from_map(&map).unwrap();
        assert_eq!(meta.purpose, PurchasePurpose::EventRegistration);
        assert_eq!(meta.registration_id.as_deref(), Some("reg-1"));
        assert!(!meta.is_renewal);
    }

    #[test]
    fn malformed_role_is_dropped() {
        let mut map = HashMap::new();
        map.insert("purpose".to_string(), "membership".to_string());
        map.insert("role".to_string(), "gold".to_string());

        let meta = PurchaseMetadata::from_map(&map).unwrap();
        assert!(meta.role.is_none());
    }
}
