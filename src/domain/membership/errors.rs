//! Membership-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | InvalidRole | 400 |
//! | ValidationFailed | 400 |
//! | MemberNotFound | 404 |
//! | DuplicateMember | 409 |
//! | PaymentMismatch | 409 |
//! | PaymentNotCompleted | 402 |
//! | PaymentDeclined | 402 |
//! | PaymentSetup | 502 |
//! | PaymentProviderUnavailable | 503 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Membership-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// Role is not one of the priced roles.
    InvalidRole(String),

    /// Request input failed validation.
    ValidationFailed { field: String, message: String },

    /// A renewal named an email with no member.
    MemberNotFound(String),

    /// A new registration named an email that already has a member.
    DuplicateMember(String),

    /// The provider does not report the intent as succeeded.
    PaymentNotCompleted {
        payment_intent_id: String,
        status: String,
    },

    /// The verified intent does not match what is being purchased.
    PaymentMismatch { reason: String },

    /// The card was declined. Message is safe to show the user.
    PaymentDeclined { message: String },

    /// The provider rejected the setup of a payment.
    PaymentSetup { message: String },

    /// The provider could not be reached.
    PaymentProviderUnavailable { message: String },

    /// Store or configuration failure.
    Infrastructure(String),
}

impl MembershipError {
    pub fn invalid_role(role: impl Into<String>) -> Self {
        MembershipError::InvalidRole(role.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MembershipError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn member_not_found(email: impl Into<String>) -> Self {
        MembershipError::MemberNotFound(email.into())
    }

    pub fn duplicate_member(email: impl Into<String>) -> Self {
        MembershipError::DuplicateMember(email.into())
    }

    pub fn payment_not_completed(
        payment_intent_id: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        MembershipError::PaymentNotCompleted {
            payment_intent_id: payment_intent_id.into(),
            status: status.into(),
        }
    }

    pub fn payment_mismatch(reason: impl Into<String>) -> Self {
        MembershipError::PaymentMismatch {
            reason: reason.into(),
        }
    }

    pub fn payment_declined(message: impl Into<String>) -> Self {
        MembershipError::PaymentDeclined {
            message: message.into(),
        }
    }

    pub fn payment_setup(message: impl Into<String>) -> Self {
        MembershipError::PaymentSetup {
            message: message.into(),
        }
    }

    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        MembershipError::PaymentProviderUnavailable {
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        MembershipError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            MembershipError::InvalidRole(_) => ErrorCode::InvalidRole,
            MembershipError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            MembershipError::MemberNotFound(_) => ErrorCode::MemberNotFound,
            MembershipError::DuplicateMember(_) => ErrorCode::DuplicateMember,
            MembershipError::PaymentNotCompleted { .. } => ErrorCode::PaymentNotCompleted,
            MembershipError::PaymentMismatch { .. } => ErrorCode::PaymentMismatch,
            MembershipError::PaymentDeclined { .. } => ErrorCode::PaymentDeclined,
            MembershipError::PaymentSetup { .. } => ErrorCode::PaymentSetupFailed,
            MembershipError::PaymentProviderUnavailable { .. } => {
                ErrorCode::PaymentProviderUnavailable
            }
            MembershipError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-facing error message.
    pub fn message(&self) -> String {
        match self {
            MembershipError::InvalidRole(role) => format!("Invalid membership role: {}", role),
            MembershipError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            MembershipError::MemberNotFound(email) => {
                format!("No member found with email {}", email)
            }
            MembershipError::DuplicateMember(email) => {
                format!("A member with email {} already exists", email)
            }
            MembershipError::PaymentNotCompleted { status, .. } => {
                format!("Payment has not completed (status: {})", status)
            }
            MembershipError::PaymentMismatch { reason } => {
                format!("Payment does not match this purchase: {}", reason)
            }
            MembershipError::PaymentDeclined { message } => {
                format!("Payment declined: {}", message)
            }
            MembershipError::PaymentSetup { message } => {
                format!("Could not set up payment: {}", message)
            }
            MembershipError::PaymentProviderUnavailable { .. } => {
                "Payment provider is temporarily unavailable".to_string()
            }
            MembershipError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MembershipError::Infrastructure(_) | MembershipError::PaymentProviderUnavailable { .. }
        )
    }
}

impl std::fmt::Display for MembershipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for MembershipError {}

impl From<ValidationError> for MembershipError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidRole { value } => MembershipError::InvalidRole(value),
            ValidationError::EmptyField { field } => {
                MembershipError::validation(field, "is required")
            }
            ValidationError::InvalidFormat { field, reason } => {
                MembershipError::validation(field, reason)
            }
        }
    }
}

impl From<DomainError> for MembershipError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => MembershipError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::MemberNotFound => MembershipError::MemberNotFound(err.message),
            ErrorCode::DuplicateMember => MembershipError::DuplicateMember(err.message),
            _ => MembershipError::Infrastructure(err.to_string()),
        }
    }
}

impl From<MembershipError> for DomainError {
    fn from(err: MembershipError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
