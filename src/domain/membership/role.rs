//! Membership role definitions.
//!
//! The role is the pricing tier a member pays for. It has nothing to do with
//! authorization level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Pricing/benefit tier of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Full professional membership.
    Full,

    /// Affiliate membership.
    Affiliate,

    /// Student / behavior-technician membership.
    StudentBt,
}

impl MemberRole {
    /// Every role, in display order.
    pub const ALL: [MemberRole; 3] = [
        MemberRole::Full,
        MemberRole::Affiliate,
        MemberRole::StudentBt,
    ];

    /// Returns the wire name used in metadata, storage and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Full => "full",
            MemberRole::Affiliate => "affiliate",
            MemberRole::StudentBt => "studentbt",
        }
    }

    /// Returns the display name for this role.
    pub fn display_name(&self) -> &'static str {
        match self {
            MemberRole::Full => "Full Member",
            MemberRole::Affiliate => "Affiliate Member",
            MemberRole::StudentBt => "Student/BT Member",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(MemberRole::Full),
            "affiliate" => Ok(MemberRole::Affiliate),
            "studentbt" => Ok(MemberRole::StudentBt),
            _ => Err(ValidationError::invalid_role(s)),
        }
    }
}
